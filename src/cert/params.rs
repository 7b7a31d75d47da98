use core::time::Duration as StdDuration;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, Ia5StringRef, OctetString, PrintableStringRef, SetOfVec, UtcTime};
use der::flagset::FlagSet;
use der::{Any, DateTime, Tag};
use time::macros::datetime;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::time::Time;

use super::SignatureScheme;
use super::extensions::{KeyUsage, ToAndFromX509Extension};
use crate::error::{PartialCertError, Result};
use crate::key::{KeyCapability, KeyDescriptor};

const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const COUNTRY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const LOCALITY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const STATE_OR_PROVINCE_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const ORGANIZATION_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATIONAL_UNIT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

/// Issuer common name used when the caller does not supply one.
pub const DEFAULT_ISSUER_COMMON_NAME: &str = "TPM X509 Test Issuer";
/// Subject common name used when the caller does not supply one.
pub const DEFAULT_SUBJECT_COMMON_NAME: &str = "TPM X509 Test Subject";

/// Times from this year on are encoded as GeneralizedTime (RFC 5280 §4.1.2.5).
const GENERALIZED_TIME_FROM_YEAR: u16 = 2050;

/// Parameters for building a partial certificate.
///
/// Every field is optional; an empty builder yields a template with the
/// placeholder names, the wide-open validity window and an empty key usage.
///
/// # Fields
/// * `capabilities` - Attributes of the key being certified, used to derive key usage.
/// * `key_usage` - A pre-derived key usage. Takes precedence over `capabilities`.
/// * `signature_scheme` - Key type and digest pre-selecting the signature algorithm.
///   When absent the device reports the algorithm in its addedTo structure.
/// * `issuer` - The issuer name. Defaults to `CN=TPM X509 Test Issuer`.
/// * `subject` - The subject name. Defaults to `CN=TPM X509 Test Subject`.
/// * `validity` - The validity window. Defaults to [`Validity::default`].
/// * `issuer_unique_id` - Optional issuer unique identifier bits.
/// * `subject_unique_id` - Optional subject unique identifier bits.
/// * `extensions` - Extensions appended after key usage, in order.
#[derive(Clone, Debug, Default, Builder)]
pub struct PartialCertificateParams {
    #[builder(default)]
    pub capabilities: FlagSet<KeyCapability>,
    pub key_usage: Option<KeyUsage>,
    pub signature_scheme: Option<SignatureScheme>,
    pub issuer: Option<DistinguishedName>,
    pub subject: Option<DistinguishedName>,
    pub validity: Option<Validity>,
    pub issuer_unique_id: Option<Vec<u8>>,
    pub subject_unique_id: Option<Vec<u8>>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

impl PartialCertificateParams {
    /// Seeds parameters from what is known about the key being certified.
    ///
    /// Signing keys pre-select the signature algorithm from their scheme hash;
    /// other keys leave the choice to the device.
    ///
    /// # Errors
    /// [`PartialCertError::UnsupportedAlgorithmCombination`] if a signing key's
    /// scheme has no signature algorithm.
    pub fn for_key(key: &KeyDescriptor) -> Result<Self> {
        let signature_scheme = match key.scheme_hash() {
            Some(digest) if key.capabilities.contains(KeyCapability::Sign) => {
                let scheme = SignatureScheme::new(key.key_type, digest);
                scheme.resolve()?;
                Some(scheme)
            }
            _ => None,
        };
        Ok(Self {
            capabilities: key.capabilities,
            signature_scheme,
            ..Self::default()
        })
    }

    /// The key usage the partial certificate will carry.
    pub fn effective_key_usage(&self) -> KeyUsage {
        self.key_usage
            .unwrap_or_else(|| KeyUsage::from_capabilities(self.capabilities))
    }

    pub fn issuer_name(&self) -> Result<Name> {
        match &self.issuer {
            Some(issuer) => issuer.as_x509_name(),
            None => DistinguishedName::common_name_only(DEFAULT_ISSUER_COMMON_NAME).as_x509_name(),
        }
    }

    pub fn subject_name(&self) -> Result<Name> {
        match &self.subject {
            Some(subject) => subject.as_x509_name(),
            None => DistinguishedName::common_name_only(DEFAULT_SUBJECT_COMMON_NAME).as_x509_name(),
        }
    }

    pub fn validity_window(&self) -> Validity {
        self.validity.clone().unwrap_or_default()
    }
}

/// Distinguished name parameters for an issuer or subject.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    pub fn common_name_only(common_name: &str) -> Self {
        Self {
            common_name: common_name.to_string(),
            ..Self::default()
        }
    }

    /// Converts the distinguished name to an X.509 `Name`.
    ///
    /// Only the attributes that are set are encoded, one per RDN, from C down
    /// to CN. Country is a PrintableString, everything else a UTF8String.
    ///
    /// # Errors
    /// [`PartialCertError::InvalidInput`] if the common name is empty or an
    /// attribute cannot be encoded.
    pub fn as_x509_name(&self) -> Result<Name> {
        if self.common_name.is_empty() {
            return Err(PartialCertError::InvalidInput(
                "distinguished name requires a common name".to_string(),
            ));
        }
        let attributes = [
            (COUNTRY_NAME, self.country.as_deref()),
            (STATE_OR_PROVINCE_NAME, self.state.as_deref()),
            (LOCALITY_NAME, self.locality.as_deref()),
            (ORGANIZATION_NAME, self.organization.as_deref()),
            (ORGANIZATIONAL_UNIT_NAME, self.organization_unit.as_deref()),
            (COMMON_NAME, Some(self.common_name.as_str())),
        ];
        let rdns = attributes
            .into_iter()
            .filter_map(|(oid, value)| value.map(|value| rdn(oid, value)))
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509 `Name`.
    ///
    /// Attributes other than CN, C, ST, L, O and OU are ignored.
    ///
    /// # Arguments
    /// * `x509dn` - The name to read.
    ///
    /// # Errors
    /// [`PartialCertError::MalformedStructure`] if a recognized attribute is not a string.
    pub fn from_x509_name(x509dn: &Name) -> Result<Self> {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let slot = match attr.oid {
                    COMMON_NAME => {
                        dn.common_name = attribute_string(&attr.value)?;
                        continue;
                    }
                    COUNTRY_NAME => &mut dn.country,
                    STATE_OR_PROVINCE_NAME => &mut dn.state,
                    LOCALITY_NAME => &mut dn.locality,
                    ORGANIZATION_NAME => &mut dn.organization,
                    ORGANIZATIONAL_UNIT_NAME => &mut dn.organization_unit,
                    _ => continue,
                };
                *slot = Some(attribute_string(&attr.value)?);
            }
        }
        Ok(dn)
    }
}

fn rdn(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    let invalid = |e: der::Error| PartialCertError::InvalidInput(format!("{oid} = {value:?}: {e}"));
    let value = if oid == COUNTRY_NAME {
        PrintableStringRef::new(value).map_err(invalid)?;
        Any::new(Tag::PrintableString, value.as_bytes())
    } else {
        Any::new(Tag::Utf8String, value.as_bytes())
    }
    .map_err(invalid)?;
    SetOfVec::try_from(vec![AttributeTypeAndValue { oid, value }])
        .map(RelativeDistinguishedName)
        .map_err(invalid)
}

fn attribute_string(value: &Any) -> Result<String> {
    if let Ok(s) = value.decode_as::<String>() {
        return Ok(s);
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
        return Ok(s.as_str().to_string());
    }
    value
        .decode_as::<Ia5StringRef<'_>>()
        .map(|s| s.as_str().to_string())
        .map_err(|e| PartialCertError::malformed("name", e))
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Default for Validity {
    /// The wide-open test window, `1970-01-01T00:00:00Z` to `9999-12-31T23:59:59Z`.
    fn default() -> Self {
        Self {
            not_before: OffsetDateTime::UNIX_EPOCH,
            not_after: datetime!(9999-12-31 23:59:59 UTC),
        }
    }
}

impl Validity {
    /// Converts to the X.509 representation, truncating to whole seconds.
    ///
    /// # Errors
    /// [`PartialCertError::InvalidInput`] if the window is inverted or either
    /// bound is outside 1970..=9999.
    pub fn to_x509(&self) -> Result<x509_cert::time::Validity> {
        if self.not_after < self.not_before {
            return Err(PartialCertError::InvalidInput(
                "validity notAfter precedes notBefore".to_string(),
            ));
        }
        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    pub fn from_x509(validity: &x509_cert::time::Validity) -> Result<Self> {
        Ok(Self {
            not_before: from_x509_time(validity.not_before)?,
            not_after: from_x509_time(validity.not_after)?,
        })
    }
}

/// Encodes a point in time as UTCTime before 2050 and GeneralizedTime after.
pub fn to_x509_time(instant: OffsetDateTime) -> Result<Time> {
    let seconds = u64::try_from(instant.unix_timestamp()).map_err(|_| {
        PartialCertError::InvalidInput(format!("time {instant} precedes the Unix epoch"))
    })?;
    let date_time = DateTime::from_unix_duration(StdDuration::from_secs(seconds))
        .map_err(|e| PartialCertError::InvalidInput(format!("time {instant}: {e}")))?;
    if date_time.year() < GENERALIZED_TIME_FROM_YEAR {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

fn from_x509_time(time: Time) -> Result<OffsetDateTime> {
    let seconds = time.to_unix_duration().as_secs();
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .ok_or_else(|| PartialCertError::malformed("validity", format!("{seconds}s out of range")))
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509(&self) -> Result<Extension> {
        Ok(Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }
}

impl From<&Extension> for ExtensionParam {
    fn from(ext: &Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}
