pub mod aa;
pub mod codon;
