//! Client identity types.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Identity of a client process talking to the perspective service.
///
/// For socket clients this is the peer process id. At most one event
/// callback is registered per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct ClientId(pub u32);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pid:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_display() {
        assert_eq!(ClientId(4242).to_string(), "pid:4242");
    }
}
