//! Scope expansion and secret assignment.

use std::collections::HashSet;

use keyshift_core::{AccountId, AssetId, SecretString};
use keyshift_secret::SecretGenerator;

use crate::{
    Account, Automation, AutomationError, AutomationResult, Inventory, Scope, SecretStrategy,
};

/// One account to rotate and the value it should end up with.
#[derive(Debug, Clone)]
pub struct Target {
    pub account: Account,
    pub secret: SecretString,
}

/// Turns an automation into its concrete target list.
///
/// Resolution has no side effects; nothing is written until the ledger
/// creates the execution.
pub struct TargetResolver<'a> {
    inventory: &'a dyn Inventory,
    generator: &'a dyn SecretGenerator,
}

impl<'a> TargetResolver<'a> {
    pub fn new(inventory: &'a dyn Inventory, generator: &'a dyn SecretGenerator) -> Self {
        Self {
            inventory,
            generator,
        }
    }

    /// Active accounts selected by `scope`, deduplicated.
    ///
    /// Order is stable: directly scoped assets first, then assets reached
    /// through nodes, accounts in inventory order within each asset.
    pub fn expand(&self, scope: &Scope) -> Vec<Account> {
        let mut seen_assets: HashSet<AssetId> = HashSet::new();
        let assets = scope
            .assets
            .iter()
            .copied()
            .chain(scope.nodes.iter().flat_map(|n| self.inventory.node_assets(*n)))
            .filter(|a| seen_assets.insert(*a))
            .collect::<Vec<_>>();

        let mut seen_accounts: HashSet<AccountId> = HashSet::new();
        assets
            .into_iter()
            .flat_map(|asset| self.inventory.asset_accounts(asset))
            .filter(|account| account.is_active && scope.selects(&account.username))
            .filter(|account| seen_accounts.insert(account.id))
            .collect()
    }

    /// Targets for a change-secret automation.
    ///
    /// Only accounts holding the automation's secret type are eligible.
    pub fn resolve(&self, automation: &Automation) -> AutomationResult<Vec<Target>> {
        let config = automation
            .as_change_secret()
            .ok_or(AutomationError::NotChangeSecret {
                automation_id: automation.id,
                kind: automation.automation_type(),
            })?;

        let accounts: Vec<Account> = self
            .expand(&automation.scope)
            .into_iter()
            .filter(|a| a.secret_type == config.secret_type)
            .collect();
        if accounts.is_empty() {
            return Err(AutomationError::EmptyScope {
                automation_id: automation.id,
            });
        }

        let targets = match config.secret_strategy {
            SecretStrategy::Specific => {
                let secret = config
                    .secret
                    .as_ref()
                    .filter(|s| !s.is_empty())
                    .ok_or(AutomationError::MissingSecret {
                        automation_id: automation.id,
                    })?;
                accounts
                    .into_iter()
                    .map(|account| Target {
                        account,
                        secret: secret.clone(),
                    })
                    .collect()
            }
            SecretStrategy::RandomOne => {
                let secret = self
                    .generator
                    .generate(config.secret_type, &config.password_rules)?;
                accounts
                    .into_iter()
                    .map(|account| Target {
                        account,
                        secret: secret.clone(),
                    })
                    .collect()
            }
            SecretStrategy::RandomAll => accounts
                .into_iter()
                .map(|account| {
                    let secret = self
                        .generator
                        .generate(config.secret_type, &config.password_rules)?;
                    Ok(Target { account, secret })
                })
                .collect::<AutomationResult<Vec<_>>>()?,
        };

        tracing::debug!(
            automation_id = %automation.id,
            strategy = ?config.secret_strategy,
            targets = targets.len(),
            "targets resolved"
        );
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Asset, AutomationKind, ChangeSecretConfig, MemoryInventory};
    use keyshift_core::{NodeId, OrgId};
    use keyshift_secret::{PasswordRules, RandomGenerator, SecretType};
    use pretty_assertions::assert_eq;

    struct Fixture {
        inv: MemoryInventory,
        node: NodeId,
        web: AssetId,
        db: AssetId,
    }

    fn fixture() -> Fixture {
        let inv = MemoryInventory::new();
        let node = inv.add_node("prod", None);
        let web = inv.add_asset(Asset::new("web01", "10.0.0.1"));
        let db = inv.add_asset(Asset::new("db01", "10.0.0.2").in_node(node));
        inv.add_account(Account::new(web, "root"));
        inv.add_account(Account::new(web, "deploy"));
        inv.add_account(Account::new(web, "old").inactive());
        inv.add_account(Account::new(db, "root"));
        inv.add_account(Account::new(db, "root").with_secret_type(SecretType::SshKey));
        Fixture { inv, node, web, db }
    }

    fn usernames(accounts: &[Account]) -> Vec<(String, AssetId)> {
        accounts.iter().map(|a| (a.username.clone(), a.asset_id)).collect()
    }

    #[test]
    fn expand_skips_inactive_and_dedups() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let scope = Scope::all_accounts()
            .with_assets([f.web, f.db])
            .with_nodes([f.node]);

        let accounts = resolver.expand(&scope);
        assert_eq!(accounts.len(), 4);
        assert_eq!(
            usernames(&accounts)[..3].to_vec(),
            vec![
                ("root".to_owned(), f.web),
                ("deploy".to_owned(), f.web),
                ("root".to_owned(), f.db),
            ]
        );
    }

    #[test]
    fn expand_filters_by_username() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let scope = Scope::default().with_accounts(["deploy"]).with_assets([f.web, f.db]);
        assert_eq!(usernames(&resolver.expand(&scope)), vec![("deploy".to_owned(), f.web)]);
    }

    #[test]
    fn empty_selector_list_selects_nothing() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        assert!(resolver.expand(&Scope::default().with_assets([f.web])).is_empty());
    }

    #[test]
    fn resolve_filters_by_secret_type() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let automation = Automation::change_secret(
            OrgId::v4(),
            "ssh",
            ChangeSecretConfig::random_all(PasswordRules::default())
                .with_secret_type(SecretType::SshKey),
        )
        .with_scope(Scope::all_accounts().with_nodes([f.node]));

        let targets = resolver.resolve(&automation).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].account.secret_type, SecretType::SshKey);
    }

    #[test]
    fn empty_scope_is_an_error() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let automation = Automation::change_secret(
            OrgId::v4(),
            "nobody",
            ChangeSecretConfig::specific("pw"),
        )
        .with_scope(Scope::default().with_accounts(["ghost"]).with_assets([f.web]));
        assert!(matches!(
            resolver.resolve(&automation),
            Err(AutomationError::EmptyScope { .. })
        ));
    }

    #[test]
    fn specific_without_secret_is_an_error() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let automation =
            Automation::change_secret(OrgId::v4(), "x", ChangeSecretConfig::default())
                .with_scope(Scope::all_accounts().with_assets([f.web]));
        assert!(matches!(
            resolver.resolve(&automation),
            Err(AutomationError::MissingSecret { .. })
        ));
    }

    #[test]
    fn specific_assigns_configured_secret() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let automation =
            Automation::change_secret(OrgId::v4(), "x", ChangeSecretConfig::specific("Fixed#123"))
                .with_scope(Scope::all_accounts().with_assets([f.web]));
        let targets = resolver.resolve(&automation).unwrap();
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.secret == SecretString::new("Fixed#123")));
    }

    #[test]
    fn random_one_shares_and_random_all_differs() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let scope = Scope::all_accounts().with_assets([f.web, f.db]);

        let one = Automation::change_secret(
            OrgId::v4(),
            "one",
            ChangeSecretConfig::random_one(PasswordRules::default()),
        )
        .with_scope(scope.clone());
        let targets = resolver.resolve(&one).unwrap();
        assert_eq!(targets.len(), 3);
        assert!(targets.iter().all(|t| t.secret == targets[0].secret));

        let all = Automation::change_secret(
            OrgId::v4(),
            "all",
            ChangeSecretConfig::random_all(PasswordRules::default()),
        )
        .with_scope(scope);
        let targets = resolver.resolve(&all).unwrap();
        assert_ne!(targets[0].secret, targets[1].secret);
        assert_ne!(targets[1].secret, targets[2].secret);
    }

    #[test]
    fn other_kinds_cannot_be_resolved() {
        let f = fixture();
        let resolver = TargetResolver::new(&f.inv, &RandomGenerator);
        let automation = Automation::new(OrgId::v4(), "facts", AutomationKind::GatherFacts);
        assert!(matches!(
            resolver.resolve(&automation),
            Err(AutomationError::NotChangeSecret { .. })
        ));
    }
}
