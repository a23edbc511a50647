//! A thin per-agent adapter onto the fan-out coordinator.
//!
//! The coordinator core (`crate::fanout`) knows nothing about chat platforms or LLMs — both are
//! out of scope per SPEC_FULL.md §1. This module is the seam where a host plugs a concrete agent
//! (one LLM-backed bot identity, one browser automation, whatever) into the coordinator's
//! `process_message` / `notify_fan_out_response` contract.

mod channel;

pub use channel::{Channel, ChannelConfig, ReplyProducer};
