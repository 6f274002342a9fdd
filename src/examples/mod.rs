//! Ready made grammars used by the documentation and the test suite: a
//! calculator with variable assignments and a deliberately ambiguous
//! expression grammar for the generalized parser.

pub mod ambig;
pub mod calc;

#[cfg(test)]
mod __tests__;
