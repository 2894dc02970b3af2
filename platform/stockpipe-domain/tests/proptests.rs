use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use stockpipe_domain::services::features::FeatureDeriver;
use stockpipe_domain::services::gap_fill::GapFiller;
use stockpipe_domain::value_objects::bar::{Bar, BarSeries, RawBar, RawBarSeries};
use stockpipe_domain::value_objects::ticker::Ticker;

fn ticker() -> Ticker {
    Ticker::parse("AAPL").expect("valid ticker")
}

fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date");
    closes
        .iter()
        .copied()
        .enumerate()
        .map(|(idx, close)| Bar {
            date: start + Days::new(idx as u64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000 + idx as u64,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn gap_filler_is_identity_on_complete_series(closes in prop::collection::vec(0.01f64..10_000.0, 0..80)) {
        let bars = bars_from_closes(&closes);
        let raw = RawBarSeries::new(ticker(), bars.iter().cloned().map(RawBar::from).collect());

        let (filled, report) = GapFiller::new().fill_with_report(raw);
        prop_assert_eq!(filled.bars(), bars.as_slice());
        prop_assert_eq!(report.dropped_rows, 0);
        prop_assert_eq!(report.forward_filled + report.backward_filled, 0);
    }

    #[test]
    fn gap_filler_never_leaves_missing_cells(
        closes in prop::collection::vec(prop::option::of(0.01f64..10_000.0), 1..80)
    ) {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date");
        let raw: Vec<RawBar> = closes
            .iter()
            .copied()
            .enumerate()
            .map(|(idx, close)| RawBar {
                date: start + Days::new(idx as u64),
                open: Some(1.0),
                high: Some(1.0),
                low: Some(1.0),
                close,
                volume: Some(1),
            })
            .collect();
        let observed = closes.iter().filter(|c| c.is_some()).count();

        let filled = GapFiller::new().fill(RawBarSeries::new(ticker(), raw));
        if observed == 0 {
            prop_assert!(filled.is_empty());
        } else {
            prop_assert_eq!(filled.len(), closes.len());
            prop_assert!(filled.bars().iter().all(|b| b.close.is_finite() && b.close > 0.0));
        }
    }

    #[test]
    fn deriver_preserves_length_and_order(closes in prop::collection::vec(0.01f64..10_000.0, 0..120)) {
        let series = BarSeries::new(ticker(), bars_from_closes(&closes));
        let rows = FeatureDeriver::default().derive(&series);

        prop_assert_eq!(rows.len(), series.len());
        for (row, bar) in rows.iter().zip(series.bars()) {
            prop_assert_eq!(row.date(), bar.date);
            prop_assert_eq!(&row.bar, bar);
        }
    }

    #[test]
    fn deriver_windows_defined_exactly_from_threshold(closes in prop::collection::vec(0.01f64..10_000.0, 1..60)) {
        let series = BarSeries::new(ticker(), bars_from_closes(&closes));
        let rows = FeatureDeriver::default().derive(&series);

        for (idx, row) in rows.iter().enumerate() {
            prop_assert_eq!(row.moving_average.is_some(), idx >= 4);
            prop_assert_eq!(row.volatility.is_some(), idx >= 5);
            if let Some(vol) = row.volatility {
                prop_assert!(vol.is_finite() && vol >= 0.0);
            }
        }
    }
}
