pub(crate) mod evictor;
pub(crate) mod fingerprint;
pub(crate) mod handle;
pub(crate) mod manager;
