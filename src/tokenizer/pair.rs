// src/tokenizer/pair.rs

/// An adjacent pair of token ids, `(left, right)`.
pub type Pair = (u32, u32);
