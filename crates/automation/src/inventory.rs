//! Asset and account inventory.
//!
//! The resolver only reads through [`Inventory`]; the asset database proper
//! lives elsewhere. [`MemoryInventory`] backs tests and the CLI.

use std::collections::HashSet;

use keyshift_core::{AccountId, AssetId, NodeId};
use keyshift_secret::SecretType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub platform: String,
    /// Nodes the asset is filed under.
    #[serde(default)]
    pub nodes: Vec<NodeId>,
}

impl Asset {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: AssetId::v4(),
            name: name.into(),
            address: address.into(),
            platform: String::new(),
            nodes: Vec::new(),
        }
    }

    pub fn in_node(mut self, node: NodeId) -> Self {
        self.nodes.push(node);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub asset_id: AssetId,
    pub username: String,
    #[serde(default)]
    pub secret_type: SecretType,
    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl Account {
    pub fn new(asset_id: AssetId, username: impl Into<String>) -> Self {
        Self {
            id: AccountId::v4(),
            asset_id,
            username: username.into(),
            secret_type: SecretType::Password,
            is_active: true,
        }
    }

    pub fn with_secret_type(mut self, secret_type: SecretType) -> Self {
        self.secret_type = secret_type;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub parent: Option<NodeId>,
}

/// Read-only view of assets, nodes and accounts.
pub trait Inventory: Send + Sync {
    fn asset(&self, id: AssetId) -> Option<Asset>;

    /// Accounts on `asset`, in a stable order.
    fn asset_accounts(&self, asset: AssetId) -> Vec<Account>;

    /// Assets under `node` or any of its descendants, in a stable order.
    fn node_assets(&self, node: NodeId) -> Vec<AssetId>;
}

/// On-disk inventory document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryFile {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Default)]
pub struct MemoryInventory {
    inner: RwLock<InventoryFile>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self, name: impl Into<String>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId::v4();
        self.inner.write().nodes.push(Node {
            id,
            name: name.into(),
            parent,
        });
        id
    }

    pub fn add_asset(&self, asset: Asset) -> AssetId {
        let id = asset.id;
        self.inner.write().assets.push(asset);
        id
    }

    pub fn add_account(&self, account: Account) -> AccountId {
        let id = account.id;
        self.inner.write().accounts.push(account);
        id
    }

    /// Returns false when no such account exists.
    pub fn set_account_active(&self, id: AccountId, is_active: bool) -> bool {
        let mut inner = self.inner.write();
        match inner.accounts.iter_mut().find(|a| a.id == id) {
            Some(account) => {
                account.is_active = is_active;
                true
            }
            None => false,
        }
    }

    pub fn to_file(&self) -> InventoryFile {
        self.inner.read().clone()
    }
}

impl From<InventoryFile> for MemoryInventory {
    fn from(file: InventoryFile) -> Self {
        Self {
            inner: RwLock::new(file),
        }
    }
}

impl Inventory for MemoryInventory {
    fn asset(&self, id: AssetId) -> Option<Asset> {
        self.inner.read().assets.iter().find(|a| a.id == id).cloned()
    }

    fn asset_accounts(&self, asset: AssetId) -> Vec<Account> {
        self.inner
            .read()
            .accounts
            .iter()
            .filter(|a| a.asset_id == asset)
            .cloned()
            .collect()
    }

    fn node_assets(&self, node: NodeId) -> Vec<AssetId> {
        let inner = self.inner.read();

        let mut subtree = vec![node];
        let mut cursor = 0;
        while cursor < subtree.len() {
            let current = subtree[cursor];
            for child in inner.nodes.iter().filter(|n| n.parent == Some(current)) {
                if !subtree.contains(&child.id) {
                    subtree.push(child.id);
                }
            }
            cursor += 1;
        }
        let subtree: HashSet<NodeId> = subtree.into_iter().collect();

        inner
            .assets
            .iter()
            .filter(|a| a.nodes.iter().any(|n| subtree.contains(n)))
            .map(|a| a.id)
            .collect()
    }
}
