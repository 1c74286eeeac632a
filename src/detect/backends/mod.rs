pub mod replay;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use replay::ReplaySource;
pub use stub::{StubObject, StubSource};

#[cfg(feature = "backend-tract")]
pub use tract::TractYoloSource;
