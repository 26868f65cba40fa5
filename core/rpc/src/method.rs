//! Method table.

use std::fmt;

/// Every remote method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Register,
    Login,
    SaveResource,
    DeleteResource,
    ListResources,
    GetResource,
    SaveFile,
    GetFile,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Register,
        Method::Login,
        Method::SaveResource,
        Method::DeleteResource,
        Method::ListResources,
        Method::GetResource,
        Method::SaveFile,
        Method::GetFile,
    ];

    /// Request path, `/<service>/<Method>`.
    pub fn path(self) -> &'static str {
        match self {
            Method::Register => "/lockbox.Auth/Register",
            Method::Login => "/lockbox.Auth/Login",
            Method::SaveResource => "/lockbox.Resources/SaveResource",
            Method::DeleteResource => "/lockbox.Resources/DeleteResource",
            Method::ListResources => "/lockbox.Resources/ListResources",
            Method::GetResource => "/lockbox.Resources/GetResource",
            Method::SaveFile => "/lockbox.Resources/SaveFile",
            Method::GetFile => "/lockbox.Resources/GetFile",
        }
    }

    /// Identity-bootstrap methods skip authorization.
    pub fn is_bypass(self) -> bool {
        matches!(self, Method::Register | Method::Login)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypass_set() {
        let bypass: Vec<_> = Method::ALL.into_iter().filter(|m| m.is_bypass()).collect();
        assert_eq!(bypass, vec![Method::Register, Method::Login]);
    }

    #[test]
    fn test_paths_are_unique() {
        let mut paths: Vec<_> = Method::ALL.into_iter().map(Method::path).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), Method::ALL.len());
    }
}
