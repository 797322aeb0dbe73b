pub mod prefixed_hex_or_bytes_vec;
pub mod string_or_native;

mod shared;
