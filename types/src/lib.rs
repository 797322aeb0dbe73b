pub mod block_id;
pub mod containers;
pub mod nonstandard;
pub mod primitives;
pub mod redacting_url;
pub mod source;
