pub mod app;
pub mod counters;
pub mod mock_transport;
pub mod test_metrics;
