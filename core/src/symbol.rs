use crate::error::{ModemError, Result};
use crate::fec::FecScheme;
use std::fmt;

/// Each character is carried as its 8-bit ordinal.
pub const BITS_PER_CHAR: usize = 8;

/// Smallest symbol width (4-tone table).
pub const MIN_SYMBOL_BITS: usize = 2;

/// Largest symbol width (256-tone table).
pub const MAX_SYMBOL_BITS: usize = 8;

/// One modulation symbol: a fixed-width group of bits, MSB first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    value: u8,
    width: u8,
}

impl Symbol {
    pub fn new(value: u8, width: usize) -> Self {
        debug_assert!((1..=MAX_SYMBOL_BITS).contains(&width));
        debug_assert!((value as usize) < (1 << width));
        Self {
            value,
            width: width as u8,
        }
    }

    pub fn from_bits(bits: &[bool]) -> Self {
        let value = bits.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8);
        Self::new(value, bits.len())
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn bits(&self) -> Vec<bool> {
        (0..self.width)
            .rev()
            .map(|shift| (self.value >> shift) & 1 == 1)
            .collect()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$b}", self.value, width = self.width as usize)
    }
}

/// Bijective map between symbol values and carrier frequencies.
///
/// Index `i` of the frequency list carries the symbol whose value is `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    frequencies: Vec<f32>,
    bits_per_symbol: usize,
}

impl SymbolTable {
    pub fn new(frequencies: Vec<f32>) -> Result<Self> {
        let n = frequencies.len();
        if !n.is_power_of_two() || n < (1 << MIN_SYMBOL_BITS) || n > (1 << MAX_SYMBOL_BITS) {
            return Err(ModemError::InvalidConfig(format!(
                "symbol table needs a power-of-two size between 4 and 256, got {}",
                n
            )));
        }

        for (i, &f) in frequencies.iter().enumerate() {
            if !f.is_finite() || f <= 0.0 {
                return Err(ModemError::InvalidConfig(format!(
                    "symbol {} has invalid frequency {}",
                    i, f
                )));
            }
            if frequencies[..i].contains(&f) {
                return Err(ModemError::InvalidConfig(format!(
                    "frequency {} Hz is assigned to more than one symbol",
                    f
                )));
            }
        }

        Ok(Self {
            bits_per_symbol: n.trailing_zeros() as usize,
            frequencies,
        })
    }

    /// Build from `("01", 700.0)` style pairs. Every bit pattern of the
    /// common width must appear exactly once.
    pub fn from_pairs(pairs: &[(&str, f32)]) -> Result<Self> {
        let width = pairs.first().map(|(bits, _)| bits.len()).unwrap_or(0);
        let mut slots: Vec<Option<f32>> = vec![None; pairs.len()];

        for &(pattern, freq) in pairs {
            if pattern.len() != width || !pattern.chars().all(|c| c == '0' || c == '1') {
                return Err(ModemError::InvalidConfig(format!(
                    "bad bit pattern {:?} in symbol table",
                    pattern
                )));
            }
            let value = usize::from_str_radix(pattern, 2)
                .map_err(|e| ModemError::InvalidConfig(e.to_string()))?;
            match slots.get_mut(value) {
                Some(slot) if slot.is_none() => *slot = Some(freq),
                _ => {
                    return Err(ModemError::InvalidConfig(format!(
                        "bit pattern {:?} is duplicated or out of range",
                        pattern
                    )))
                }
            }
        }

        let frequencies: Option<Vec<f32>> = slots.into_iter().collect();
        let frequencies = frequencies.ok_or_else(|| {
            ModemError::InvalidConfig("symbol table does not cover every bit pattern".to_string())
        })?;

        let table = Self::new(frequencies)?;
        if table.bits_per_symbol != width {
            return Err(ModemError::InvalidConfig(format!(
                "{}-bit patterns need {} entries",
                width,
                1usize << width
            )));
        }
        Ok(table)
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.bits_per_symbol
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn symbol(&self, value: u8) -> Symbol {
        Symbol::new(value, self.bits_per_symbol)
    }

    pub fn frequency(&self, symbol: Symbol) -> f32 {
        self.frequencies[symbol.value() as usize]
    }

    /// Symbol whose carrier is closest to `frequency`.
    ///
    /// Never fails. An exact tie between two carriers resolves to the one
    /// listed first (lowest symbol value).
    pub fn nearest(&self, frequency: f32) -> Symbol {
        let mut best = 0usize;
        let mut best_distance = f32::INFINITY;
        for (i, &f) in self.frequencies.iter().enumerate() {
            let distance = (f - frequency).abs();
            if distance < best_distance {
                best_distance = distance;
                best = i;
            }
        }
        self.symbol(best as u8)
    }
}

/// Text to bits, 8 bits per character, MSB first.
pub fn text_to_bits(text: &str) -> Result<Vec<bool>> {
    let mut bits = Vec::with_capacity(text.len() * BITS_PER_CHAR);
    for c in text.chars() {
        let ordinal = u8::try_from(u32::from(c)).map_err(|_| ModemError::UnencodableCharacter(c))?;
        bits.extend((0..BITS_PER_CHAR).rev().map(|shift| (ordinal >> shift) & 1 == 1));
    }
    Ok(bits)
}

/// Bits to text. A trailing group shorter than 8 bits is padding and is dropped.
pub fn bits_to_text(bits: &[bool]) -> String {
    bits.chunks_exact(BITS_PER_CHAR)
        .map(|chunk| {
            let byte = chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8);
            char::from(byte)
        })
        .collect()
}

/// Group bits into symbols, zero-padding the last group.
pub fn bits_to_symbols(bits: &[bool], width: usize) -> Vec<Symbol> {
    bits.chunks(width)
        .map(|chunk| {
            let mut group = chunk.to_vec();
            group.resize(width, false);
            Symbol::from_bits(&group)
        })
        .collect()
}

pub fn symbols_to_bits(symbols: &[Symbol]) -> Vec<bool> {
    symbols.iter().flat_map(|s| s.bits()).collect()
}

/// Text <-> symbol stream, with the optional block code in between.
#[derive(Debug, Clone)]
pub struct SymbolCodec {
    table: SymbolTable,
    fec: FecScheme,
}

impl SymbolCodec {
    pub fn new(table: SymbolTable, fec: FecScheme) -> Self {
        Self { table, fec }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn fec(&self) -> FecScheme {
        self.fec
    }

    pub fn encode(&self, text: &str) -> Result<Vec<Symbol>> {
        let bits = text_to_bits(text)?;
        let coded = self.fec.encode(&bits);
        Ok(bits_to_symbols(&coded, self.table.bits_per_symbol()))
    }

    pub fn decode(&self, symbols: &[Symbol]) -> String {
        let coded = symbols_to_bits(symbols);
        let bits = self.fec.decode(&coded);
        bits_to_text(&bits)
    }

    /// Carrier frequency for each symbol.
    pub fn frequencies(&self, symbols: &[Symbol]) -> Vec<f32> {
        symbols.iter().map(|&s| self.table.frequency(s)).collect()
    }

    /// Nearest-match every detected frequency, then decode.
    pub fn decode_frequencies(&self, detected: &[f32]) -> String {
        let symbols: Vec<Symbol> = detected.iter().map(|&f| self.table.nearest(f)).collect();
        self.decode(&symbols)
    }
}
