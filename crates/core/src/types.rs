/// Credentials of the account being created.
///
/// Built once when the driver provisions a mailbox and never mutated
/// afterwards; everything else borrows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    address: String,
    password: String,
}

impl SessionIdentity {
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}
