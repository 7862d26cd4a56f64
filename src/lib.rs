//! Local state-management core for an agent command console.
//!
//! Four cooperating services: a structured command language for addressing
//! simulated agents, an event-driven data store over a durable key-value
//! namespace, an offline-first synchronization manager, and an adaptive
//! notification delivery layer. Host shells own all rendering and reach the
//! core through these modules' entry points and the event bus; every
//! "remote" interaction is a simulated, latency-injected stand-in behind the
//! [`core::remote::RemoteGateway`] port.

pub mod core;
pub mod logging;
pub mod storage;
