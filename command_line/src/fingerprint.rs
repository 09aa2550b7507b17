// Copyright 2017 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Where `VectorArg::add_to_fingerprint` and `CommandLine::add_to_fingerprint`
/// write their mirrored evaluation. Implemented here by `Sha256Fingerprinter`;
/// the host may also implement it itself to fold a command line into a
/// larger action-key hash without an intermediate buffer.
pub trait FingerprintSink {
    fn add_string(&mut self, value: &str);
    fn add_uuid(&mut self, value: Uuid);
}

/// The crate's own `FingerprintSink`, backed by the same `Sha256` the
/// `hashing` crate uses for `Fingerprint`/`Digest`. Strings are length
/// prefixed so that adjacent tokens can never be confused with each other
/// (`["ab", "c"]` vs. `["a", "bc"]`).
pub struct Sha256Fingerprinter(Sha256);

impl Sha256Fingerprinter {
    pub fn new() -> Self {
        Sha256Fingerprinter(Sha256::new())
    }

    pub fn finish(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

impl Default for Sha256Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintSink for Sha256Fingerprinter {
    fn add_string(&mut self, value: &str) {
        self.0.update((value.len() as u64).to_le_bytes());
        self.0.update(value.as_bytes());
    }

    fn add_uuid(&mut self, value: Uuid) {
        self.0.update(value.as_bytes());
    }
}

macro_rules! salt {
    ($name:ident, $uuid:literal) => {
        pub static $name: Lazy<Uuid> = Lazy::new(|| Uuid::parse_str($uuid).unwrap());
    };
}

// The stable per-feature salts from `spec.md` §6. These are load-bearing:
// changing one changes every cached fingerprint that used the corresponding
// feature bit, so they are pinned as literal constants, never derived.
salt!(SALT_EXPAND_DIRECTORIES, "9d7520d2-a187-11e8-98d0-529269fb1459");
salt!(SALT_UNIQUIFY, "7f494c3e-faea-4498-a521-5d3bc6ee19eb");
salt!(SALT_OMIT_IF_EMPTY, "923206f1-6474-4a8f-b30f-4dd3143622e6");
salt!(SALT_HAS_ARG_NAME, "2bc00382-7199-46ec-ad52-1556577cde1a");
salt!(SALT_HAS_FORMAT_EACH, "8e974aec-df07-4a51-9418-f4c1172b4045");
salt!(SALT_HAS_BEFORE_EACH, "f7e101bc-644d-4277-8562-6515ad55a988");
salt!(SALT_HAS_JOIN_WITH, "c227dbd3-edad-454e-bc8a-c9b5ba1c38a3");
salt!(SALT_HAS_FORMAT_JOINED, "528af376-4233-4c27-be4d-b0ff24ed68db");
salt!(SALT_HAS_TERMINATE_WITH, "a4e5e090-0dbd-4d41-899a-77cfbba58655");
salt!(SALT_SINGLE_FORMATTED, "8cb96642-a235-4fe0-b3ed-ebfdae8a0bd9");
