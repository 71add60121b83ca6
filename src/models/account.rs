//! Accounting references (taxes, payment terms, fiscal positions, accounts)
//! and exported payments.

use crate::sync::mapper::{Literal, MatchKey, Mapper, Rule};
use crate::sync::registry::{Dependency, ExportSpec, ImportSpec, ModelConfig};

pub(super) fn models() -> Vec<ModelConfig> {
    vec![tax(), payment_term(), fiscal_position(), account_group(), account(), payment()]
}

fn tax() -> ModelConfig {
    ModelConfig::new("account.tax").with_inactive().importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("amount", "amount"), ("type_tax_use", "type_tax_use")])
            .rule(
                Rule::match_existing(&[
                    MatchKey::Field { from: "name", to: "name" },
                    MatchKey::Field { from: "type_tax_use", to: "type_tax_use" },
                ])
                .include_inactive(),
            ),
        ..ImportSpec::default()
    })
}

fn payment_term() -> ModelConfig {
    ModelConfig::new("account.payment.term").with_inactive().importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("active", "active"), ("note", "note")])
            .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]).include_inactive()),
        ..ImportSpec::default()
    })
}

fn fiscal_position() -> ModelConfig {
    ModelConfig::new("account.fiscal.position").importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("note", "note")])
            .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }])),
        ..ImportSpec::default()
    })
}

fn account_group() -> ModelConfig {
    ModelConfig::new("account.group").priority(5).importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("code_prefix_start", "code_prefix_start")])
            .rule(Rule::many2one("parent_id", "parent_id", "account.group")),
        dependencies: vec![Dependency::Many2One { field: "parent_id", model: "account.group" }],
        ..ImportSpec::default()
    })
}

fn account() -> ModelConfig {
    ModelConfig::new("account.account").importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("code", "code"), ("name", "name"), ("reconcile", "reconcile")])
            .rule(Rule::many2one("group_id", "group_id", "account.group").lenient())
            .rule(Rule::match_existing(&[MatchKey::Field { from: "code", to: "code" }])),
        ..ImportSpec::default()
    })
}

/// Payments are export-only. The acquirer has no counterpart on this side,
/// so its remote id comes from the `payment_acquirer_id` constant.
fn payment() -> ModelConfig {
    ModelConfig::new("account.payment").exporting(ExportSpec {
        mapper: Mapper::new()
            .direct(&[("amount", "amount"), ("state", "state")])
            .rule(Rule::many2one("partner_id", "partner_id", "res.partner"))
            .rule(Rule::many2one("currency_id", "currency_id", "res.currency"))
            .rule(Rule::many2one("partner_country_id", "partner_country_id", "res.country").lenient())
            .rule(Rule::many2many("sale_order_ids", "sale_order_ids", "sale.order").lenient())
            .rule(Rule::constant("acquirer_id", "payment_acquirer_id"))
            .rule(Rule::constant("type", "payment_type").or(Literal::Str("form"))),
        dependencies: vec![
            Dependency::Many2One { field: "payment_id", model: "account.payment" },
            Dependency::Many2One { field: "partner_id", model: "res.partner" },
        ],
        ..ExportSpec::default()
    })
}
