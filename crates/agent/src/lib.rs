//! Negotiation agent runtime - turn processing and language boundary
//!
//! This crate wires the pure decision and conversation logic from
//! `parley-core` to the outside world:
//! - Classifies inbound vendor messages (LLM-first, heuristic fallback)
//! - Extracts structured offers from free text
//! - Generates outbound replies (templates, optionally polished by an LLM)
//! - Drives the per-turn pipeline and commits each turn atomically
//!
//! # Architecture
//!
//! A turn flows through a fixed pipeline:
//! 1. **Classification** (`classify`) - Inbound text → `CounterpartIntent`
//! 2. **Extraction** (`extract`) - Inbound text → partial `Offer`
//! 3. **Decision + phase advance** - Pure calls into `parley-core`
//! 4. **Response generation** (`respond`) - Intent + variables → reply text
//! 5. **Commit** (`processor`) - One atomic write via `parley-db`
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It NEVER decides prices, acceptance, or
//! escalation. Those are deterministic decisions made by the core engine, and
//! every LLM output is validated against them before it is sent.

pub mod classify;
pub mod extract;
pub mod llm;
pub mod processor;
pub mod respond;
