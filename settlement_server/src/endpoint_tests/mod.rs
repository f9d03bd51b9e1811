mod accounts;
pub(crate) mod helpers;
mod orders;
