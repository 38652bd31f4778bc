pub mod catalog;
pub mod errors;
pub mod model;
pub mod query;
pub mod util;
pub mod value;

pub use catalog::*;
pub use errors::*;
pub use model::*;
pub use query::*;
pub use value::*;
