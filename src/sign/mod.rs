macro_rules! corrupt {
    ($sym:ident, $e:expr) => {
        #[cfg(any(test, feature = "malicious"))]
        let $sym = $e;
    };
}

mod api;
pub use api::*;

mod r1;
mod r2;
mod r3;
mod r4;

pub mod plain;

#[cfg(any(test, feature = "malicious"))]
pub mod malicious;

#[cfg(test)]
mod tests;
