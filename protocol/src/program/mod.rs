//! # Program Builder
//!
//! Source text for the three on-chain programs (lending approval, clear
//! state, escrow guard) and the compiled form the orchestrator signs with.
//!
//! The escrow needs no deployment transaction: its address is the hash of
//! its bytecode, its bytecode is a function of its source, and its source
//! is a function of the application id. Anyone can recompute it.

pub mod source;

pub use source::{
    build_clear_source, build_escrow_source, build_state_machine_source,
    parse_escrow_application_id,
};

use std::fmt;

use crate::account::Address;

/// Compiled bytecode and the address it controls.
#[derive(Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    bytecode: Vec<u8>,
    address: Address,
}

impl CompiledProgram {
    pub fn from_bytecode(bytecode: Vec<u8>) -> Self {
        let address = Address::from_program(&bytecode);
        Self { bytecode, address }
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// The logic-signature account address of this program.
    pub fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("address", &self.address)
            .field("len", &self.bytecode.len())
            .finish()
    }
}
