//! Structures and functions related to processing name constraints

use url::Url;

use x509_cert::ext::pkix::{
    constraints::name::{GeneralSubtree, GeneralSubtrees},
    name::GeneralName,
    SubjectAltName,
};
use x509_cert::name::Name;

use crate::util::pvc_alg_oids::PKCS9_EMAIL_ADDRESS;
use crate::util::pvc_utilities::*;

/// Name forms for which name constraints are enforced
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum NameForm {
    DirectoryName,
    Rfc822Name,
    DnsName,
    UniformResourceIdentifier,
    IpAddress,
}

fn form_of(gn: &GeneralName) -> Option<NameForm> {
    match gn {
        GeneralName::DirectoryName(_) => Some(NameForm::DirectoryName),
        GeneralName::Rfc822Name(_) => Some(NameForm::Rfc822Name),
        GeneralName::DnsName(_) => Some(NameForm::DnsName),
        GeneralName::UniformResourceIdentifier(_) => Some(NameForm::UniformResourceIdentifier),
        GeneralName::IpAddress(_) => Some(NameForm::IpAddress),
        _ => None,
    }
}

/// A name taken from a certificate that is subject to name constraints
enum CandidateName<'a> {
    Dn(&'a Name),
    Email(String),
    Dns(String),
    UriHost(String),
    Ip(Vec<u8>),
}

impl CandidateName<'_> {
    fn form(&self) -> NameForm {
        match self {
            CandidateName::Dn(_) => NameForm::DirectoryName,
            CandidateName::Email(_) => NameForm::Rfc822Name,
            CandidateName::Dns(_) => NameForm::DnsName,
            CandidateName::UriHost(_) => NameForm::UniformResourceIdentifier,
            CandidateName::Ip(_) => NameForm::IpAddress,
        }
    }

    /// `within` returns true if the name falls within the subtree.
    fn within(&self, subtree: &GeneralSubtree) -> bool {
        match (self, &subtree.base) {
            (CandidateName::Dn(name), GeneralName::DirectoryName(base)) => {
                descended_from_dn(base, name, subtree.minimum, subtree.maximum)
            }
            (CandidateName::Email(addr), GeneralName::Rfc822Name(base)) => {
                descended_from_rfc822(base, addr)
            }
            (CandidateName::Dns(host), GeneralName::DnsName(base)) => {
                descended_from_host(base, host, false)
            }
            (CandidateName::UriHost(host), GeneralName::UniformResourceIdentifier(base)) => {
                descended_from_host(base, host, true)
            }
            (CandidateName::Ip(addr), GeneralName::IpAddress(base)) => {
                descended_from_ip(base.as_bytes(), addr)
            }
            _ => false,
        }
    }
}

fn subject_names(subject: &Name) -> Vec<CandidateName<'_>> {
    let mut names = vec![];
    if subject.0.is_empty() {
        // NULL subjects get a free pass
        return names;
    }
    names.push(CandidateName::Dn(subject));
    for email in attribute_values(subject, &PKCS9_EMAIL_ADDRESS) {
        names.push(CandidateName::Email(email));
    }
    names
}

fn san_names(san: Option<&SubjectAltName>) -> Vec<CandidateName<'_>> {
    let mut names = vec![];
    if let Some(san) = san {
        for gn in san.0.iter() {
            match gn {
                GeneralName::DirectoryName(dn) => names.push(CandidateName::Dn(dn)),
                GeneralName::Rfc822Name(addr) => names.push(CandidateName::Email(addr.to_string())),
                GeneralName::DnsName(dns) => names.push(CandidateName::Dns(dns.to_string())),
                GeneralName::UniformResourceIdentifier(uri) => {
                    // URIs without a host can not be compared with a constraint
                    if let Some(host) = Url::parse(uri.as_str())
                        .ok()
                        .and_then(|url| url.host_str().map(|h| h.to_string()))
                    {
                        names.push(CandidateName::UriHost(host));
                    }
                }
                GeneralName::IpAddress(ip) => names.push(CandidateName::Ip(ip.as_bytes().to_vec())),
                _ => {}
            }
        }
    }
    names
}

/// `Subtrees` is the state for one name form. An empty `names` vector with `null` false means no
/// constraint has been seen for the form. `null` is set when an intersection yields the empty set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Subtrees {
    /// Accumulated subtrees
    pub names: Vec<GeneralSubtree>,
    /// True if an intersection operation yielded the empty set
    pub null: bool,
}

/// The `NameConstraintsSet` structure is used to track the permitted_subtrees and excluded_subtrees
/// state variables while processing a certification path per [RFC 5280 Section 6.1].
///
/// Constraints are tracked for directoryName, rfc822Name, dNSName, uniformResourceIdentifier and
/// iPAddress forms. Subtrees of other forms are collected in `not_supported` and otherwise ignored.
///
/// [RFC 5280 Section 6.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1>
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NameConstraintsSet {
    /// directory_name governs use of DNs in SANs and subject fields
    pub directory_name: Subtrees,
    /// rfc822_name governs use of email addresses in SANs and emailAddress attributes
    pub rfc822_name: Subtrees,
    /// dns_name governs use of DNS names in SANs
    pub dns_name: Subtrees,
    /// uniform_resource_identifier governs the host portion of URIs in SANs
    pub uniform_resource_identifier: Subtrees,
    /// ip_address governs use of IP addresses in SANs
    pub ip_address: Subtrees,
    /// not_supported collects subtrees of forms that are not enforced
    pub not_supported: Vec<GeneralSubtree>,
}

impl NameConstraintsSet {
    fn bucket(&self, form: NameForm) -> &Subtrees {
        match form {
            NameForm::DirectoryName => &self.directory_name,
            NameForm::Rfc822Name => &self.rfc822_name,
            NameForm::DnsName => &self.dns_name,
            NameForm::UniformResourceIdentifier => &self.uniform_resource_identifier,
            NameForm::IpAddress => &self.ip_address,
        }
    }

    fn bucket_mut(&mut self, form: NameForm) -> &mut Subtrees {
        match form {
            NameForm::DirectoryName => &mut self.directory_name,
            NameForm::Rfc822Name => &mut self.rfc822_name,
            NameForm::DnsName => &mut self.dns_name,
            NameForm::UniformResourceIdentifier => &mut self.uniform_resource_identifier,
            NameForm::IpAddress => &mut self.ip_address,
        }
    }

    /// `calculate_intersection` calculates the intersection of self and ext and saves the result in
    /// self. Used to merge a permittedSubtrees field into the permitted_subtrees state.
    pub fn calculate_intersection(&mut self, ext: &GeneralSubtrees) {
        for form in [
            NameForm::DirectoryName,
            NameForm::Rfc822Name,
            NameForm::DnsName,
            NameForm::UniformResourceIdentifier,
            NameForm::IpAddress,
        ] {
            let new_names: Vec<&GeneralSubtree> = ext
                .iter()
                .filter(|s| form_of(&s.base) == Some(form))
                .collect();
            let bucket = self.bucket_mut(form);
            if bucket.null || new_names.is_empty() {
                // nothing to intersect (either state has become NULL or there are no names to add)
                continue;
            }

            let mut new_set = Vec::new();
            for new_name in new_names {
                if bucket.names.is_empty() {
                    new_set.push(new_name.clone());
                    continue;
                }
                for prev_name in &bucket.names {
                    if new_name == prev_name || subtree_within(new_name, prev_name) {
                        new_set.push(new_name.clone());
                    } else if subtree_within(prev_name, new_name) {
                        new_set.push(prev_name.clone());
                    }
                }
            }

            if new_set.is_empty() {
                bucket.null = true;
                bucket.names.clear();
            } else {
                bucket.names = new_set;
            }
        }
    }

    /// `calculate_union` calculates the union of self and ext and saves the result in self. Used to
    /// merge an excludedSubtrees field into the excluded_subtrees state.
    pub fn calculate_union(&mut self, ext: &GeneralSubtrees) {
        for subtree in ext {
            match form_of(&subtree.base) {
                Some(form) => {
                    let bucket = self.bucket_mut(form);
                    if !bucket.names.contains(subtree) {
                        bucket.names.push(subtree.clone());
                    }
                }
                None => self.not_supported.push(subtree.clone()),
            }
        }
    }

    /// `are_any_empty` returns true if any of the name constraints buckets has been set to NULL.
    pub fn are_any_empty(&self) -> bool {
        self.directory_name.null
            || self.rfc822_name.null
            || self.dns_name.null
            || self.uniform_resource_identifier.null
            || self.ip_address.null
    }

    fn permitted(&self, names: &[CandidateName<'_>]) -> bool {
        names.iter().all(|name| {
            let bucket = self.bucket(name.form());
            if bucket.null {
                return false;
            }
            bucket.names.is_empty() || bucket.names.iter().any(|s| name.within(s))
        })
    }

    fn excluded(&self, names: &[CandidateName<'_>]) -> bool {
        names.iter().any(|name| {
            self.bucket(name.form())
                .names
                .iter()
                .any(|s| name.within(s))
        })
    }

    /// `subject_within_permitted_subtrees` returns true if the subject and any emailAddress
    /// attributes in it are within the permitted subtrees known to self. Empty subjects are
    /// permitted.
    pub fn subject_within_permitted_subtrees(&self, subject: &Name) -> bool {
        self.permitted(&subject_names(subject))
    }

    /// `subject_within_excluded_subtrees` returns true if the subject or any emailAddress attribute
    /// in it is within at least one excluded subtree known to self.
    pub fn subject_within_excluded_subtrees(&self, subject: &Name) -> bool {
        self.excluded(&subject_names(subject))
    }

    /// `san_within_permitted_subtrees` returns true if every name in san is within the permitted
    /// subtrees known to self. Names of forms that are not enforced are permitted.
    pub fn san_within_permitted_subtrees(&self, san: Option<&SubjectAltName>) -> bool {
        self.permitted(&san_names(san))
    }

    /// `san_within_excluded_subtrees` returns true if any name in san is within at least one excluded
    /// subtree known to self.
    pub fn san_within_excluded_subtrees(&self, san: Option<&SubjectAltName>) -> bool {
        self.excluded(&san_names(san))
    }
}

/// `subtree_within` returns true if every name in inner is also within outer.
fn subtree_within(inner: &GeneralSubtree, outer: &GeneralSubtree) -> bool {
    match (&inner.base, &outer.base) {
        (GeneralName::DirectoryName(i), GeneralName::DirectoryName(o)) => {
            descended_from_dn(o, i, 0, None)
        }
        (GeneralName::Rfc822Name(i), GeneralName::Rfc822Name(o)) => {
            descended_from_rfc822(o, i.as_str())
        }
        (GeneralName::DnsName(i), GeneralName::DnsName(o)) => {
            descended_from_host(o, i.as_str(), false)
        }
        (GeneralName::UniformResourceIdentifier(i), GeneralName::UniformResourceIdentifier(o)) => {
            descended_from_host(o, i.as_str().trim_start_matches('.'), true)
        }
        (GeneralName::IpAddress(i), GeneralName::IpAddress(o)) => {
            let (i, o) = (i.as_bytes(), o.as_bytes());
            if i.len() != o.len() || i.len() % 2 != 0 {
                return false;
            }
            let half = i.len() / 2;
            let (i_net, i_mask) = i.split_at(half);
            let (_, o_mask) = o.split_at(half);
            // inner mask must be at least as specific as the outer mask
            i_mask.iter().zip(o_mask.iter()).all(|(im, om)| im & om == *om)
                && descended_from_ip(o, i_net)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use der::asn1::{Ia5String, OctetString};

    fn dns_subtree(name: &str) -> GeneralSubtree {
        GeneralSubtree {
            base: GeneralName::DnsName(Ia5String::new(name).unwrap()),
            minimum: 0,
            maximum: None,
        }
    }

    fn ip_subtree(bytes: &[u8]) -> GeneralSubtree {
        GeneralSubtree {
            base: GeneralName::IpAddress(OctetString::new(bytes).unwrap()),
            minimum: 0,
            maximum: None,
        }
    }

    fn dn_subtree(name: &str) -> GeneralSubtree {
        GeneralSubtree {
            base: GeneralName::DirectoryName(Name::from_str(name).unwrap()),
            minimum: 0,
            maximum: None,
        }
    }

    fn san(names: Vec<GeneralName>) -> SubjectAltName {
        SubjectAltName(names)
    }

    #[test]
    fn every_san_must_be_permitted() {
        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&vec![dns_subtree("example.com")]);

        let ok = san(vec![
            GeneralName::DnsName(Ia5String::new("www.example.com").unwrap()),
            GeneralName::DnsName(Ia5String::new("example.com").unwrap()),
        ]);
        assert!(permitted.san_within_permitted_subtrees(Some(&ok)));

        let mixed = san(vec![
            GeneralName::DnsName(Ia5String::new("www.example.com").unwrap()),
            GeneralName::DnsName(Ia5String::new("www.example.net").unwrap()),
        ]);
        assert!(!permitted.san_within_permitted_subtrees(Some(&mixed)));
        assert!(permitted.san_within_permitted_subtrees(None));
    }

    #[test]
    fn disjoint_intersection_is_null() {
        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&vec![dns_subtree("example.com")]);
        permitted.calculate_intersection(&vec![dns_subtree("sub.example.com")]);
        assert_eq!(vec![dns_subtree("sub.example.com")], permitted.dns_name.names);
        permitted.calculate_intersection(&vec![dns_subtree("example.net")]);
        assert!(permitted.are_any_empty());

        let host = san(vec![GeneralName::DnsName(
            Ia5String::new("www.sub.example.com").unwrap(),
        )]);
        assert!(!permitted.san_within_permitted_subtrees(Some(&host)));
    }

    #[test]
    fn excluded_subject_and_ip() {
        let mut excluded = NameConstraintsSet::default();
        excluded.calculate_union(&vec![
            dn_subtree("O=Bad Org,C=US"),
            ip_subtree(&[10, 0, 0, 0, 255, 0, 0, 0]),
        ]);

        let subject = Name::from_str("CN=host,O=Bad Org,C=US").unwrap();
        assert!(excluded.subject_within_excluded_subtrees(&subject));
        let subject = Name::from_str("CN=host,O=Good Org,C=US").unwrap();
        assert!(!excluded.subject_within_excluded_subtrees(&subject));

        let ip = san(vec![GeneralName::IpAddress(
            OctetString::new(vec![10, 1, 2, 3]).unwrap(),
        )]);
        assert!(excluded.san_within_excluded_subtrees(Some(&ip)));
        let ip = san(vec![GeneralName::IpAddress(
            OctetString::new(vec![192, 168, 1, 1]).unwrap(),
        )]);
        assert!(!excluded.san_within_excluded_subtrees(Some(&ip)));
    }

    #[test]
    fn narrower_ip_range_survives_intersection() {
        let mut permitted = NameConstraintsSet::default();
        permitted.calculate_intersection(&vec![ip_subtree(&[10, 0, 0, 0, 255, 0, 0, 0])]);
        permitted.calculate_intersection(&vec![ip_subtree(&[10, 1, 0, 0, 255, 255, 0, 0])]);
        assert_eq!(
            vec![ip_subtree(&[10, 1, 0, 0, 255, 255, 0, 0])],
            permitted.ip_address.names
        );
    }
}
