/// Business logic, independent of the gRPC layer
pub mod product;
pub mod user;

pub use product::ProductService;
pub use user::{LoginOutcome, UserService};
