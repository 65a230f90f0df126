/// Result alias used at the binary and presentation edges.
pub type Result<T> = anyhow::Result<T>;
