//! Domain rules shared by services and handlers.

pub mod guest;
pub mod locale;
pub mod order;
pub mod paging;
pub mod product;
pub mod slug;
