//! Administrative CRUD (SPEC_FULL §2): minimal user management plus the
//! full rate-limit and price-book surfaces the core pipeline depends on.
//! Every handler here runs behind the admin-secret auth layer.

pub mod limits;
pub mod pricing;
pub mod users;
