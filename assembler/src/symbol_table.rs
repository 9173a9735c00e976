//! Symbol table for the Hack assembler.
//!
//! Hybrid storage: the 23 predefined symbols live in a compile-time perfect
//! hash map, user-defined labels and variables in a `HashMap`. Predefined
//! lookups therefore cost nothing at startup and are checked first on every
//! resolution.

use phf::phf_map;
use std::collections::HashMap;

use crate::error::AsmError;

/// Predefined symbols, built into the Hack platform.
static PREDEFINED_SYMBOLS: phf::Map<&'static str, u16> = phf_map! {
    // Virtual registers
    "R0" => 0,
    "R1" => 1,
    "R2" => 2,
    "R3" => 3,
    "R4" => 4,
    "R5" => 5,
    "R6" => 6,
    "R7" => 7,
    "R8" => 8,
    "R9" => 9,
    "R10" => 10,
    "R11" => 11,
    "R12" => 12,
    "R13" => 13,
    "R14" => 14,
    "R15" => 15,

    // Special pointers
    "SP" => 0,
    "LCL" => 1,
    "ARG" => 2,
    "THIS" => 3,
    "THAT" => 4,

    // I/O pointers
    "SCREEN" => 16384,
    "KBD" => 24576,
};

/// First RAM address handed to auto-allocated variables.
pub const FIRST_VARIABLE_ADDRESS: u16 = 16;

/// Maps symbolic names to 16-bit addresses.
///
/// Labels are recorded during pass 1 with [`SymbolTable::define_label`];
/// variables are allocated during pass 2 with [`SymbolTable::get_or_insert`].
///
/// # Example
/// ```
/// use hack_assembler::SymbolTable;
///
/// let mut st = SymbolTable::new();
/// assert_eq!(st.resolve("SP"), Some(0));
///
/// st.define_label("LOOP", 100).unwrap();
/// assert_eq!(st.resolve("LOOP"), Some(100));
/// ```
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// User-defined symbols (labels and variables).
    user_symbols: HashMap<String, u16>,
}

impl SymbolTable {
    /// Creates a new symbol table.
    ///
    /// Predefined symbols are available immediately; space is pre-allocated
    /// for a typical user symbol count.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_symbols: HashMap::with_capacity(32),
        }
    }

    /// Records a label at the given instruction address.
    ///
    /// A label may be defined at most once, and may not shadow a predefined
    /// symbol.
    pub fn define_label(&mut self, symbol: &str, address: u16) -> Result<(), AsmError> {
        if PREDEFINED_SYMBOLS.contains_key(symbol) || self.user_symbols.contains_key(symbol) {
            return Err(AsmError::DuplicateLabel {
                symbol: symbol.to_string(),
            });
        }
        self.user_symbols.insert(symbol.to_string(), address);
        Ok(())
    }

    /// Looks up a symbol, predefined first.
    #[inline]
    #[must_use]
    pub fn resolve(&self, symbol: &str) -> Option<u16> {
        PREDEFINED_SYMBOLS
            .get(symbol)
            .or_else(|| self.user_symbols.get(symbol))
            .copied()
    }

    /// Checks whether a symbol exists, predefined or user-defined.
    #[inline]
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        PREDEFINED_SYMBOLS.contains_key(symbol) || self.user_symbols.contains_key(symbol)
    }

    /// Gets a symbol's address, allocating the next free variable slot if the
    /// symbol is unknown.
    ///
    /// This is the hot path of pass 2: once a variable has been assigned an
    /// address, that address is stable for the rest of the program.
    ///
    /// # Example
    /// ```
    /// use hack_assembler::SymbolTable;
    ///
    /// let mut st = SymbolTable::new();
    /// let mut next = 16;
    /// assert_eq!(st.get_or_insert("i", &mut next), 16);
    /// assert_eq!(st.get_or_insert("sum", &mut next), 17);
    /// assert_eq!(st.get_or_insert("i", &mut next), 16);
    /// assert_eq!(next, 18);
    /// ```
    #[inline]
    pub fn get_or_insert(&mut self, symbol: &str, next_address: &mut u16) -> u16 {
        use std::collections::hash_map::Entry;

        if let Some(&addr) = PREDEFINED_SYMBOLS.get(symbol) {
            return addr;
        }

        match self.user_symbols.entry(symbol.to_string()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let addr = *next_address;
                *next_address += 1;
                *e.insert(addr)
            }
        }
    }

    /// Number of user-defined symbols.
    #[inline]
    #[must_use]
    pub fn user_symbol_count(&self) -> usize {
        self.user_symbols.len()
    }

    /// Number of predefined symbols (23).
    #[inline]
    #[must_use]
    pub const fn predefined_symbol_count() -> usize {
        PREDEFINED_SYMBOLS.len()
    }
}
