//! The closed set of data-access methods

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every operation of the data-access contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    GetList,
    GetOne,
    GetMany,
    GetManyReference,
    Create,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::GetList,
        Method::GetOne,
        Method::GetMany,
        Method::GetManyReference,
        Method::Create,
        Method::Update,
        Method::UpdateMany,
        Method::Delete,
        Method::DeleteMany,
    ];

    /// Wire name used in request keys and logs
    pub fn name(&self) -> &'static str {
        match self {
            Method::GetList => "getList",
            Method::GetOne => "getOne",
            Method::GetMany => "getMany",
            Method::GetManyReference => "getManyReference",
            Method::Create => "create",
            Method::Update => "update",
            Method::UpdateMany => "updateMany",
            Method::Delete => "delete",
            Method::DeleteMany => "deleteMany",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Method::GetList | Method::GetOne | Method::GetMany | Method::GetManyReference
        )
    }

    pub fn is_write(&self) -> bool {
        !self.is_read()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown data provider method '{}'", s))
    }
}
