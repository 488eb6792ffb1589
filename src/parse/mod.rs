mod formula;
pub use formula::*;

mod reaction;
pub use reaction::*;
