use {
    anyhow::{Error, format_err},
    rand::{TryRngCore, rngs::OsRng},
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{
        borrow::Cow,
        fmt::{self, Debug, Display},
        str::FromStr,
    },
};

/// Length of an AES-256 key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Symmetric key used to decrypt ciphertext containers.
///
/// Keys travel as base-58 text alongside the transaction that references the
/// encrypted resource.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptionKey([u8; KEY_LENGTH]);

impl DecryptionKey {
    #[inline]
    pub fn generate() -> anyhow::Result<Self> {
        let mut key = [0u8; KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|err| format_err!("failed to generate key: {err}"))?;
        Ok(Self(key))
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    #[must_use]
    #[inline]
    pub fn display_unmasked(&self) -> impl Display + '_ {
        bs58::encode(self.0).into_string()
    }
}

impl From<[u8; KEY_LENGTH]> for DecryptionKey {
    #[inline]
    fn from(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl FromStr for DecryptionKey {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s).into_vec()?;
        let array = <[u8; KEY_LENGTH]>::try_from(bytes).map_err(|bytes| {
            format_err!("invalid length; got {}, expected {KEY_LENGTH}", bytes.len())
        })?;
        Ok(Self(array))
    }
}

impl<'de> Deserialize<'de> for DecryptionKey {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl Serialize for DecryptionKey {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        bs58::encode(self.0).into_string().serialize(serializer)
    }
}

impl Debug for DecryptionKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKey").finish()
    }
}
