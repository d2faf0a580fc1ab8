/// Shared-secret check for the command protocol's `auth` request.
#[derive(Debug, Clone)]
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: String) -> Self {
        Self { password }
    }

    /// Compares every byte so the time taken does not depend on where the
    /// first mismatch is.
    pub fn verify(&self, candidate: &str) -> bool {
        let expected = self.password.as_bytes();
        let given = candidate.as_bytes();
        if expected.len() != given.len() {
            return false;
        }
        expected
            .iter()
            .zip(given)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
