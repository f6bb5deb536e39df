// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! This module verifies the `ES256` signature of a seal against a trusted certificate.
//!
//! The signature is the raw concatenation `r || s` of two 32 byte big-endian integers, computed
//! with ECDSA over P-256 on the SHA-256 digest of the signed region.  An unverifiable seal is a
//! valid outcome, hence [`verify_signature`] reports it as `false` rather than an error.

use bherror::traits::{ErrorContext as _, ForeignError as _};
use openssl::{
    bn::BigNum,
    ec::EcKey,
    ecdsa::EcdsaSig,
    nid::Nid,
    pkey::Public,
    x509::X509,
};
use serde::Serialize;

use crate::{
    fields::SignatureBlock,
    trust::CertificateStore,
    utils::{base64::base64_decode, digest::sha256},
    DniError, Result,
};

// X9_62_PRIME256V1 is the ANSI X9.62 name of NIST P-256 (SECG secp256r1).
pub(crate) const ELLIPTIC_CURVE_NID: Nid = Nid::X9_62_PRIME256V1;

/// Length of the `r || s` signature.
pub const SIGNATURE_LENGTH: usize = 64;

const PEM_BEGIN_MARKER: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END_MARKER: &str = "-----END CERTIFICATE-----";

const COORDINATE_LENGTH: usize = SIGNATURE_LENGTH / 2;

/// The result of checking the signature of a seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// The signature is valid for a trusted certificate.
    Verified,
    /// The payload has no signature field.
    Unsigned,
    /// No trusted certificate matches the certificate reference.
    CertificateNotFound,
    /// The signature is not a 64 byte `r || s` value.
    InvalidSignatureEncoding,
    /// The trusted certificate could not be used.
    InvalidCertificate,
    /// The signature does not match the signed data.
    Mismatch,
}

impl SignatureStatus {
    /// Whether the seal is authentic.
    pub fn is_verified(self) -> bool {
        self == Self::Verified
    }

    /// Checks the signature of the seal, if it has one.
    pub(crate) fn check(
        signature: Option<&SignatureBlock<'_>>,
        certificate_reference: &str,
        certificate_store: &CertificateStore,
    ) -> Self {
        let Some(block) = signature else {
            tracing::warn!("seal has no signature, it will not be verified");
            return Self::Unsigned;
        };

        let result = check_signature(
            block.signed_region(),
            block.signature(),
            certificate_reference,
            certificate_store,
        );

        match result {
            Ok(()) => Self::Verified,
            Err(err) => {
                tracing::warn!(%certificate_reference, error = %err.error, "seal is not verified");
                Self::from_error(&err.error)
            }
        }
    }

    fn from_error(error: &DniError) -> Self {
        match error {
            DniError::CertificateNotFound(_) => Self::CertificateNotFound,
            DniError::InvalidSignatureEncoding(_) => Self::InvalidSignatureEncoding,
            DniError::InvalidCertificate => Self::InvalidCertificate,
            _ => Self::Mismatch,
        }
    }
}

/// Verifies the `signature` over the `signed_region` with the certificate the
/// `certificate_reference` selects from the `certificate_store`.
///
/// Every failure, from a missing certificate to a mismatching signature, yields `false`.  Use
/// [`check_signature`] to learn the reason.
pub fn verify_signature(
    signed_region: &[u8],
    signature: &[u8],
    certificate_reference: &str,
    certificate_store: &CertificateStore,
) -> bool {
    check_signature(
        signed_region,
        signature,
        certificate_reference,
        certificate_store,
    )
    .is_ok()
}

/// Same as [`verify_signature`], but reports why verification failed.
///
/// # Errors
///
/// - [`DniError::CertificateNotFound`] if the store has no certificate for the reference;
/// - [`DniError::InvalidCertificate`] if the certificate is not a valid P-256 certificate;
/// - [`DniError::InvalidSignatureEncoding`] if the signature is not 64 bytes long;
/// - [`DniError::InvalidSignature`] if the signature does not match.
pub fn check_signature(
    signed_region: &[u8],
    signature: &[u8],
    certificate_reference: &str,
    certificate_store: &CertificateStore,
) -> Result<()> {
    let certificate = certificate_store
        .get(certificate_reference)
        .ok_or_else(|| {
            bherror::Error::root(DniError::CertificateNotFound(
                certificate_reference.to_ascii_lowercase(),
            ))
        })?;

    let public_key = public_key_from_pem(certificate)
        .ctx(|| format!("certificate for reference {certificate_reference}"))?;

    let signature = ecdsa_signature_from_raw(signature)?;

    let digest = sha256(signed_region);
    let valid = signature
        .verify(&digest, &public_key)
        .foreign_err(|| DniError::InvalidSignature)?;

    if !valid {
        return Err(bherror::Error::root(DniError::InvalidSignature));
    }

    Ok(())
}

/// Extracts the P-256 public key of a PEM encoded X.509 certificate.
///
/// The PEM armor and all whitespace are stripped before decoding the body, so any line width is
/// accepted, including the whole certificate on a single line.
pub fn public_key_from_pem(certificate: &str) -> Result<EcKey<Public>> {
    let body: String = certificate
        .replace(PEM_BEGIN_MARKER, "")
        .replace(PEM_END_MARKER, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let der = base64_decode(body)
        .foreign_err(|| DniError::InvalidCertificate)
        .ctx(|| "certificate is not valid base64")?;

    public_key_from_der(&der)
}

/// Extracts the P-256 public key of a DER encoded X.509 certificate.
pub fn public_key_from_der(certificate: &[u8]) -> Result<EcKey<Public>> {
    let certificate = X509::from_der(certificate)
        .foreign_err(|| DniError::InvalidCertificate)
        .ctx(|| "failed to parse X.509 certificate")?;

    let public_key = certificate
        .public_key()
        .foreign_err(|| DniError::InvalidCertificate)
        .ctx(|| "failed to access X.509 public key")?
        .ec_key()
        .foreign_err(|| DniError::InvalidCertificate)
        .ctx(|| "certificate key is not an EC key")?;

    if public_key.group().curve_name() != Some(ELLIPTIC_CURVE_NID) {
        return Err(bherror::Error::root(DniError::InvalidCertificate)
            .ctx("certificate key is not on the P-256 curve"));
    }

    Ok(public_key)
}

fn ecdsa_signature_from_raw(signature: &[u8]) -> Result<EcdsaSig> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(bherror::Error::root(DniError::InvalidSignatureEncoding(
            signature.len(),
        )));
    }

    let (r, s) = signature.split_at(COORDINATE_LENGTH);
    let r = BigNum::from_slice(r).foreign_err(|| DniError::CryptoBackend)?;
    let s = BigNum::from_slice(s).foreign_err(|| DniError::CryptoBackend)?;

    EcdsaSig::from_private_components(r, s).foreign_err(|| DniError::CryptoBackend)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_utils::{
        TestIssuer, SPANISH_TEST_CERTIFICATE, SPANISH_TEST_CERTIFICATE_REFERENCE,
    };

    const MESSAGE: &[u8] = b"\xDC\x03 signed region of a seal";

    fn setup() -> (TestIssuer, CertificateStore) {
        let issuer = TestIssuer::generate();
        let store = [("ABCD", issuer.certificate_pem())].into_iter().collect();
        (issuer, store)
    }

    #[test]
    fn test_verify_signature() {
        let (issuer, store) = setup();
        let signature = issuer.sign(MESSAGE);

        assert_eq!(signature.len(), SIGNATURE_LENGTH);
        assert!(verify_signature(MESSAGE, &signature, "ABCD", &store));
        assert!(verify_signature(MESSAGE, &signature, "abcd", &store));
        check_signature(MESSAGE, &signature, "abcd", &store).unwrap();
    }

    #[test]
    fn test_verify_signature_is_deterministic() {
        let (issuer, store) = setup();
        let signature = issuer.sign(MESSAGE);

        let results: Vec<_> = (0..3)
            .map(|_| verify_signature(MESSAGE, &signature, "ABCD", &store))
            .collect();

        assert_eq!(results, [true, true, true]);
    }

    #[test]
    fn test_verify_signature_tampered_message() {
        let (issuer, store) = setup();
        let signature = issuer.sign(MESSAGE);

        let mut tampered = MESSAGE.to_vec();
        tampered[5] ^= 0x01;

        assert!(!verify_signature(&tampered, &signature, "ABCD", &store));
        assert_matches!(
            check_signature(&tampered, &signature, "ABCD", &store)
                .unwrap_err()
                .error,
            DniError::InvalidSignature
        );
    }

    #[test]
    fn test_verify_signature_other_issuer() {
        let (_, store) = setup();
        let signature = TestIssuer::generate().sign(MESSAGE);

        assert!(!verify_signature(MESSAGE, &signature, "ABCD", &store));
    }

    #[test]
    fn test_verify_signature_unknown_certificate() {
        let (issuer, store) = setup();
        let signature = issuer.sign(MESSAGE);

        assert!(!verify_signature(MESSAGE, &signature, "DCBA", &store));
        assert_eq!(
            check_signature(MESSAGE, &signature, "DCBA", &store)
                .unwrap_err()
                .error,
            DniError::CertificateNotFound("dcba".to_owned())
        );
    }

    #[test]
    fn test_verify_signature_wrong_length() {
        let (issuer, store) = setup();
        let signature = issuer.sign(MESSAGE);

        assert!(!verify_signature(MESSAGE, &signature[..63], "ABCD", &store));
        assert_eq!(
            check_signature(MESSAGE, &signature[..63], "ABCD", &store)
                .unwrap_err()
                .error,
            DniError::InvalidSignatureEncoding(63)
        );

        let mut longer = signature.clone();
        longer.push(0);
        assert!(!verify_signature(MESSAGE, &longer, "ABCD", &store));
    }

    #[test]
    fn test_verify_signature_invalid_certificate() {
        let certificate = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----";
        let store: CertificateStore = [("ABCD", certificate)].into_iter().collect();

        assert_eq!(
            check_signature(MESSAGE, &[0; 64], "ABCD", &store)
                .unwrap_err()
                .error,
            DniError::InvalidCertificate
        );
    }

    #[test]
    fn test_public_key_from_pem_wide_lines() {
        let public_key = public_key_from_pem(SPANISH_TEST_CERTIFICATE).unwrap();

        assert_eq!(public_key.group().curve_name(), Some(ELLIPTIC_CURVE_NID));
        public_key.check_key().unwrap();
    }

    #[test]
    fn test_verify_signature_single_line_pem() {
        let issuer = TestIssuer::generate();
        let pem = issuer.certificate_pem();
        let body: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let single_line = format!("{PEM_BEGIN_MARKER}{body}{PEM_END_MARKER}");
        assert_eq!(single_line.lines().count(), 1);

        let store: CertificateStore = [("ABCD", single_line)].into_iter().collect();
        let signature = issuer.sign(MESSAGE);

        check_signature(MESSAGE, &signature, "ABCD", &store).unwrap();
    }

    #[test]
    fn test_verify_signature_with_spanish_certificate() {
        let store: CertificateStore = [(
            SPANISH_TEST_CERTIFICATE_REFERENCE,
            SPANISH_TEST_CERTIFICATE,
        )]
        .into_iter()
        .collect();
        let signature = TestIssuer::generate().sign(MESSAGE);

        assert_matches!(
            check_signature(
                MESSAGE,
                &signature,
                &SPANISH_TEST_CERTIFICATE_REFERENCE.to_uppercase(),
                &store
            )
            .unwrap_err()
            .error,
            DniError::InvalidSignature
        );
    }

    #[test]
    fn test_signature_status() {
        let (issuer, store) = setup();
        let region = MESSAGE;
        let signature = issuer.sign(region);
        let block = SignatureBlock::new(region, &signature);

        assert_eq!(
            SignatureStatus::check(Some(&block), "ABCD", &store),
            SignatureStatus::Verified
        );
        assert_eq!(
            SignatureStatus::check(Some(&block), "FFFF", &store),
            SignatureStatus::CertificateNotFound
        );
        assert_eq!(
            SignatureStatus::check(None, "ABCD", &store),
            SignatureStatus::Unsigned
        );

        let short = SignatureBlock::new(region, &signature[..63]);
        assert_eq!(
            SignatureStatus::check(Some(&short), "ABCD", &store),
            SignatureStatus::InvalidSignatureEncoding
        );

        let tampered = SignatureBlock::new(&region[1..], &signature);
        assert_eq!(
            SignatureStatus::check(Some(&tampered), "ABCD", &store),
            SignatureStatus::Mismatch
        );
        assert!(!SignatureStatus::Mismatch.is_verified());
    }
}
