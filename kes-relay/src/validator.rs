//! Structural validation of PEM-encoded public keys.
//!
//! A message is a key if its first PEM block decodes as one of:
//! - `PUBLIC KEY` (SubjectPublicKeyInfo) carrying RSA, DSA, Ed25519, Ed448,
//!   X25519, X448, or EC key material on P-256, P-384, P-521, secp256k1 or
//!   brainpoolP256r1 / P384r1 / P512r1
//! - `RSA PUBLIC KEY` (PKCS#1)
//!
//! The armor is read leniently: text around the block is ignored and the
//! base64 body may be wrapped at any width, or not at all, with LF or CRLF
//! line endings. Every failure collapses to "not a key". Nothing here
//! performs I/O.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::{BigUint, RsaPublicKey};
use spki::{DecodePublicKey, ObjectIdentifier, SubjectPublicKeyInfoRef};
use std::fmt;

const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_END: &str = "-----END ";
const PEM_DASHES: &str = "-----";

/// PEM label for a SubjectPublicKeyInfo document.
const SPKI_LABEL: &str = "PUBLIC KEY";

/// PEM label for a PKCS#1 RSAPublicKey document.
const PKCS1_LABEL: &str = "RSA PUBLIC KEY";

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
const ID_X25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");
const ID_X448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.111");
const ID_ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const ID_ED448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.113");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

// Named curves carried in the ecPublicKey parameters.
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");
const SECP256K1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

/// Raw Montgomery / Edwards key lengths (RFC 8410).
const X25519_KEY_LEN: usize = 32;
const X448_KEY_LEN: usize = 56;
const ED448_KEY_LEN: usize = 57;

/// Algorithm of a recognized public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA, from either SPKI or PKCS#1 encoding.
    Rsa,
    /// DSA with its domain parameters.
    Dsa,
    /// Ed25519 signing key.
    Ed25519,
    /// Ed448 signing key.
    Ed448,
    /// X25519 key agreement key.
    X25519,
    /// X448 key agreement key.
    X448,
    /// ECDSA / ECDH key on NIST P-256.
    P256,
    /// ECDSA / ECDH key on NIST P-384.
    P384,
    /// ECDSA / ECDH key on NIST P-521.
    P521,
    /// ECDSA / ECDH key on secp256k1.
    Secp256k1,
    /// ECDSA / ECDH key on brainpoolP256r1.
    BrainpoolP256r1,
    /// ECDSA / ECDH key on brainpoolP384r1.
    BrainpoolP384r1,
    /// ECDSA / ECDH key on brainpoolP512r1.
    BrainpoolP512r1,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rsa => "rsa",
            Self::Dsa => "dsa",
            Self::Ed25519 => "ed25519",
            Self::Ed448 => "ed448",
            Self::X25519 => "x25519",
            Self::X448 => "x448",
            Self::P256 => "p256",
            Self::P384 => "p384",
            Self::P521 => "p521",
            Self::Secp256k1 => "secp256k1",
            Self::BrainpoolP256r1 => "brainpoolP256r1",
            Self::BrainpoolP384r1 => "brainpoolP384r1",
            Self::BrainpoolP512r1 => "brainpoolP512r1",
        };
        f.write_str(name)
    }
}

/// Returns `true` iff `text` is a well-formed PEM public key.
///
/// Never panics, whatever the input.
pub fn is_valid_key(text: &str) -> bool {
    classify_key(text).is_some()
}

/// Identify the algorithm of a PEM public key.
///
/// Returns `None` for anything that is not a structurally valid key:
/// bad armor, bad base64, bad DER, unknown algorithm, or key material
/// rejected by the algorithm's own decoder (e.g. an EC point off the curve).
pub fn classify_key(text: &str) -> Option<KeyKind> {
    let (label, der) = decode_pem(text)?;

    match label {
        SPKI_LABEL => classify_spki(&der),
        PKCS1_LABEL => RsaPublicKey::from_pkcs1_der(&der)
            .ok()
            .map(|_| KeyKind::Rsa),
        _ => None,
    }
}

/// Find the first PEM block in `text` and base64-decode its body.
///
/// Whitespace anywhere in the body is dropped before decoding, so line width
/// and line endings do not matter. The END label must match BEGIN.
fn decode_pem(text: &str) -> Option<(&str, Vec<u8>)> {
    let begin = text.find(PEM_BEGIN)? + PEM_BEGIN.len();
    let (label, rest) = text[begin..].split_once(PEM_DASHES)?;

    let footer = format!("{PEM_END}{label}{PEM_DASHES}");
    let body: String = rest[..rest.find(&footer)?]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let der = STANDARD.decode(body).ok()?;
    Some((label, der))
}

fn classify_spki(der: &[u8]) -> Option<KeyKind> {
    let spki = SubjectPublicKeyInfoRef::try_from(der).ok()?;
    let oid = spki.algorithm.oid;

    if oid == RSA_ENCRYPTION {
        decodes::<RsaPublicKey>(der, KeyKind::Rsa)
    } else if oid == ID_DSA {
        decodes::<dsa::VerifyingKey>(der, KeyKind::Dsa)
    } else if oid == ID_ED25519 {
        decodes::<ed25519_dalek::VerifyingKey>(der, KeyKind::Ed25519)
    } else if oid == ID_ED448 {
        raw_key(&spki, ED448_KEY_LEN, KeyKind::Ed448)
    } else if oid == ID_X25519 {
        raw_key(&spki, X25519_KEY_LEN, KeyKind::X25519)
    } else if oid == ID_X448 {
        raw_key(&spki, X448_KEY_LEN, KeyKind::X448)
    } else if oid == ID_EC_PUBLIC_KEY {
        classify_ec(der, &spki)
    } else {
        None
    }
}

/// Full decode through the algorithm's own key type.
fn decodes<K: DecodePublicKey>(der: &[u8], kind: KeyKind) -> Option<KeyKind> {
    K::from_public_key_der(der).ok().map(|_| kind)
}

/// Keys with no algorithm parameters and a fixed raw length.
fn raw_key(spki: &SubjectPublicKeyInfoRef<'_>, len: usize, kind: KeyKind) -> Option<KeyKind> {
    let key = spki.subject_public_key.as_bytes()?;
    (spki.algorithm.parameters.is_none() && key.len() == len).then_some(kind)
}

fn classify_ec(der: &[u8], spki: &SubjectPublicKeyInfoRef<'_>) -> Option<KeyKind> {
    // Explicit curve parameters are not accepted, only named curves.
    let curve = spki.algorithm.parameters_oid().ok()?;

    if curve == SECP256R1 {
        decodes::<p256::PublicKey>(der, KeyKind::P256)
    } else if curve == SECP384R1 {
        decodes::<p384::PublicKey>(der, KeyKind::P384)
    } else if curve == SECP521R1 {
        decodes::<p521::PublicKey>(der, KeyKind::P521)
    } else if curve == SECP256K1 {
        decodes::<k256::PublicKey>(der, KeyKind::Secp256k1)
    } else {
        let params = BRAINPOOL_CURVES.iter().find(|c| c.oid == curve)?;
        let point = spki.subject_public_key.as_bytes()?;
        params.contains(point).then_some(params.kind)
    }
}

/// Short Weierstrass curve `y^2 = x^3 + ax + b` over a prime field, for
/// curves without a dedicated decoder crate. Parameters are big-endian hex.
struct PrimeCurve {
    oid: ObjectIdentifier,
    kind: KeyKind,
    p: &'static str,
    a: &'static str,
    b: &'static str,
}

/// RFC 5639 domain parameters.
static BRAINPOOL_CURVES: [PrimeCurve; 3] = [
    PrimeCurve {
        oid: ObjectIdentifier::new_unwrap("1.3.36.3.3.2.8.1.1.7"),
        kind: KeyKind::BrainpoolP256r1,
        p: "a9fb57dba1eea9bc3e660a909d838d726e3bf623d52620282013481d1f6e5377",
        a: "7d5a0975fc2c3057eef67530417affe7fb8055c126dc5c6ce94a4b44f330b5d9",
        b: "26dc5c6ce94a4b44f330b5d9bbd77cbf958416295cf7e1ce6bccdc18ff8c07b6",
    },
    PrimeCurve {
        oid: ObjectIdentifier::new_unwrap("1.3.36.3.3.2.8.1.1.11"),
        kind: KeyKind::BrainpoolP384r1,
        p: "8cb91e82a3386d280f5d6f7e50e641df152f7109ed5456b412b1da197fb71123\
            acd3a729901d1a71874700133107ec53",
        a: "7bc382c63d8c150c3c72080ace05afa0c2bea28e4fb22787139165efba91f90f\
            8aa5814a503ad4eb04a8c7dd22ce2826",
        b: "04a8c7dd22ce28268b39b55416f0447c2fb77de107dcd2a62e880ea53eeb62d5\
            7cb4390295dbc9943ab78696fa504c11",
    },
    PrimeCurve {
        oid: ObjectIdentifier::new_unwrap("1.3.36.3.3.2.8.1.1.13"),
        kind: KeyKind::BrainpoolP512r1,
        p: "aadd9db8dbe9c48b3fd4e6ae33c9fc07cb308db3b3c9d20ed6639cca70330871\
            7d4d9b009bc66842aecda12ae6a380e62881ff2f2d82c68528aa6056583a48f3",
        a: "7830a3318b603b89e2327145ac234cc594cbdd8d3df91610a83441caea9863bc\
            2ded5d5aa8253aa10a2ef1c98b9ac8b57f1117a72bf2c7b9e7c1ac4d77fc94ca",
        b: "3df91610a83441caea9863bc2ded5d5aa8253aa10a2ef1c98b9ac8b57f1117a7\
            2bf2c7b9e7c1ac4d77fc94cadc083e67984050b75ebae5dd2809bd638016f723",
    },
];

impl PrimeCurve {
    /// Whether `point` is a SEC1 point on this curve, compressed or not.
    fn contains(&self, point: &[u8]) -> bool {
        let parse = |hex: &str| BigUint::parse_bytes(hex.as_bytes(), 16);
        let (Some(p), Some(a), Some(b)) = (parse(self.p), parse(self.a), parse(self.b)) else {
            return false;
        };
        let len = self.p.len() / 2;
        let Some((&tag, coords)) = point.split_first() else {
            return false;
        };

        let rhs = |x: &BigUint| (x * x * x + &a * x + &b) % &p;

        match tag {
            0x04 if coords.len() == 2 * len => {
                let (x, y) = coords.split_at(len);
                let (x, y) = (BigUint::from_bytes_be(x), BigUint::from_bytes_be(y));
                x < p && y < p && (&y * &y) % &p == rhs(&x)
            }
            0x02 | 0x03 if coords.len() == len => {
                let x = BigUint::from_bytes_be(coords);
                if x >= p {
                    return false;
                }
                // Some y exists iff the right-hand side is a square mod p
                let y2 = rhs(&x);
                let zero = BigUint::from(0u32);
                let one = BigUint::from(1u32);
                if y2 == zero {
                    return tag == 0x02;
                }
                y2.modpow(&((&p - &one) >> 1usize), &p) == one
            }
            _ => false,
        }
    }
}
