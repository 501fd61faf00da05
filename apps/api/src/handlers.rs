pub mod audits;
pub mod health;
pub mod metrics;
pub mod worker;

#[cfg(test)]
mod test_support;
