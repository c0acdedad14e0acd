//! Integration tests exercising valuation and swap flows end to end
//! against deterministic in-process mocks.

mod mocks;
mod swap_flow;
mod valuation_flow;
