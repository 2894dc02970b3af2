pub mod bar;
pub mod feature_row;
pub mod ticker;
