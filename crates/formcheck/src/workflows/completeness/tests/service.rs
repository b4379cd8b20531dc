use std::sync::Arc;

use super::common::*;
use crate::workflows::completeness::domain::{DocumentId, DocumentStatus, FormFields, FormKey};
use crate::workflows::completeness::repository::{
    DocumentRepository, IssueFilter, IssueId, RepositoryError, RuleCatalog,
};
use crate::workflows::completeness::rules::{
    CalculationRule, RequiredFieldRule, Rule, RuleSet,
};
use crate::workflows::completeness::{
    CheckSelection, CheckType, CompletenessService, CompletenessServiceError, EngineSettings,
    RunStatus, Severity,
};

#[test]
fn register_stores_uploaded_document() {
    let (service, documents, _) = build_service();

    let record = service
        .register(registration(income_fields(40800)))
        .expect("registration succeeds");

    assert!(record.document_id.0.starts_with("DOC-"));
    assert_eq!(record.status, DocumentStatus::Uploaded);
    assert!(record.processed_at.is_none());
    let stored = documents
        .fetch(&record.document_id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored, record);
}

#[test]
fn register_rejects_blank_scope() {
    let (service, _, _) = build_service();
    let mut payload = registration(FormFields::new());
    payload.form_code = "  ".to_string();

    match service.register(payload) {
        Err(CompletenessServiceError::InvalidRegistration(message)) => {
            assert!(message.contains("form_code"));
        }
        other => panic!("expected invalid registration, got {other:?}"),
    }
}

#[test]
fn check_persists_issues_and_marks_document_checked() {
    let (service, documents, _) = build_service();
    let record = service
        .register(registration(income_fields(45000)))
        .expect("registration succeeds");

    let report = service
        .check(&record.document_id, &CheckSelection::all())
        .expect("check succeeds");

    assert_eq!(report.document_id, record.document_id);
    assert_eq!(report.form_code, "1040");
    assert_eq!(report.summary.total_issues, 2);
    assert_eq!(report.summary.critical_issues, 1);
    assert_eq!(report.summary.medium_priority_issues, 1);
    assert_eq!(report.summary.status, RunStatus::IssuesFound);
    assert_eq!(report.checks_performed.len(), 4);
    assert_eq!(
        report.checks_performed[&CheckType::Calculations].issues_found,
        1
    );
    assert_eq!(
        report.checks_performed[&CheckType::RequiredFields].issues_found,
        0
    );
    assert!(report.warnings.is_empty());

    let kinds: Vec<CheckType> = report
        .issues
        .iter()
        .map(|record| record.issue.check_type)
        .collect();
    assert_eq!(
        kinds,
        vec![CheckType::Calculations, CheckType::JurisdictionSpecific]
    );
    assert_eq!(documents.stored_issues(), report.issues);

    let stored = documents
        .fetch(&record.document_id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.status, DocumentStatus::Checked);
    assert_eq!(stored.processed_at, Some(report.checked_at));
}

#[test]
fn check_limits_report_to_selected_types() {
    let (service, _, _) = build_service();
    let record = service
        .register(registration(income_fields(45000)))
        .expect("registration succeeds");

    let report = service
        .check(
            &record.document_id,
            &CheckSelection::from_types([CheckType::RequiredFields]),
        )
        .expect("check succeeds");

    assert_eq!(report.summary.total_issues, 0);
    assert_eq!(report.summary.status, RunStatus::NoIssues);
    assert_eq!(
        report.checks_performed.keys().copied().collect::<Vec<_>>(),
        vec![CheckType::RequiredFields]
    );
}

#[test]
fn check_reports_missing_document_and_rule_set() {
    let (service, _, _) = build_service();

    match service.check(&DocumentId("DOC-missing".to_string()), &CheckSelection::all()) {
        Err(CompletenessServiceError::DocumentNotFound(id)) => assert_eq!(id.0, "DOC-missing"),
        other => panic!("expected missing document, got {other:?}"),
    }

    let mut payload = registration(FormFields::new());
    payload.form_code = "1120".to_string();
    let record = service.register(payload).expect("registration succeeds");
    match service.check(&record.document_id, &CheckSelection::all()) {
        Err(CompletenessServiceError::RuleSetNotFound(key)) => {
            assert_eq!(key.to_string(), "US/1120/2024");
        }
        other => panic!("expected missing rule set, got {other:?}"),
    }
}

#[test]
fn rerunning_a_check_appends_issue_rows() {
    let (service, documents, _) = build_service();
    let record = service
        .register(registration(income_fields(45000)))
        .expect("registration succeeds");

    service
        .check(&record.document_id, &CheckSelection::all())
        .expect("first check");
    service
        .check(&record.document_id, &CheckSelection::all())
        .expect("second check");

    assert_eq!(documents.stored_issues().len(), 4);
}

#[test]
fn malformed_catalog_rules_surface_as_warnings() {
    let documents = Arc::new(MemoryDocuments::default());
    let catalog = Arc::new(MemoryCatalog::with(
        RuleSet::new(form_key())
            .with_rule(Rule::Calculation(CalculationRule::new(
                "Ratio",
                "total_income",
                "wages / 2",
            )))
            .with_rule(taxpayer_name_rule()),
    ));
    let service = CompletenessService::new(documents, catalog, EngineSettings::default());
    let record = service
        .register(registration(FormFields::new().with("total_income", 10)))
        .expect("registration succeeds");

    let report = service
        .check(&record.document_id, &CheckSelection::all())
        .expect("check still succeeds");

    assert_eq!(report.summary.total_issues, 1);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].rule_name, "Ratio");
}

#[test]
fn issues_are_sorted_and_filtered() {
    let (service, _, _) = build_service();
    let record = service
        .register(registration(income_fields(45000)))
        .expect("registration succeeds");
    service
        .check(&record.document_id, &CheckSelection::all())
        .expect("check succeeds");

    let all = service
        .issues(&record.document_id, &IssueFilter::default())
        .expect("issues listed");
    assert_eq!(all.total_issues, 2);
    assert_eq!(all.issues[0].issue.severity, Severity::Critical);
    assert_eq!(all.issues[1].issue.severity, Severity::Medium);

    let medium = service
        .issues(
            &record.document_id,
            &IssueFilter {
                severity: Some(Severity::Medium),
                resolved: None,
            },
        )
        .expect("issues listed");
    assert_eq!(medium.total_issues, 1);
    assert_eq!(medium.issues[0].issue.field_name, "filing_status");
}

#[test]
fn issues_for_unknown_document_is_not_found() {
    let (service, _, _) = build_service();

    assert!(matches!(
        service.issues(&DocumentId("nope".to_string()), &IssueFilter::default()),
        Err(CompletenessServiceError::DocumentNotFound(_))
    ));
}

#[test]
fn resolve_marks_issue_and_filters_follow() {
    let (service, _, _) = build_service();
    let record = service
        .register(registration(income_fields(45000)))
        .expect("registration succeeds");
    let report = service
        .check(&record.document_id, &CheckSelection::all())
        .expect("check succeeds");
    let target = report.issues[0].id;

    let resolved = service.resolve_issue(target).expect("issue resolves");
    assert!(resolved.issue.is_resolved);

    let open = service
        .issues(
            &record.document_id,
            &IssueFilter {
                severity: None,
                resolved: Some(false),
            },
        )
        .expect("issues listed");
    assert_eq!(open.total_issues, 1);
    assert!(open.issues.iter().all(|record| record.id != target));
}

#[test]
fn resolve_unknown_issue_is_not_found() {
    let (service, _, _) = build_service();

    match service.resolve_issue(IssueId(9_999)) {
        Err(CompletenessServiceError::IssueNotFound(IssueId(9_999))) => {}
        other => panic!("expected missing issue, got {other:?}"),
    }
}

#[test]
fn repository_failures_propagate() {
    let service = CompletenessService::new(
        Arc::new(UnavailableDocuments),
        Arc::new(MemoryCatalog::default()),
        EngineSettings::default(),
    );

    match service.register(registration(FormFields::new())) {
        Err(CompletenessServiceError::Repository(RepositoryError::Unavailable(reason))) => {
            assert_eq!(reason, "database offline");
        }
        other => panic!("expected repository failure, got {other:?}"),
    }
}

#[test]
fn publish_replaces_rule_set_and_returns_lint_warnings() {
    let (service, _, catalog) = build_service();
    let replacement = RuleSet::new(form_key())
        .with_fields(["wages", "total_income"])
        .with_rule(Rule::Calculation(CalculationRule::new(
            "Total income",
            "total_income",
            "wages + bonus",
        )));

    let warnings = service
        .publish_rule_set(replacement.clone())
        .expect("rule set publishes");

    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("unknown field 'bonus'"));
    assert_eq!(
        catalog.rule_set(&form_key()).expect("lookup succeeds"),
        Some(replacement)
    );
}

#[test]
fn publish_rejects_blank_scope() {
    let (service, _, _) = build_service();
    let mut rule_set = RuleSet::new(form_key());
    rule_set.key.jurisdiction = String::new();

    assert!(matches!(
        service.publish_rule_set(rule_set),
        Err(CompletenessServiceError::InvalidRuleSet(_))
    ));
}

#[test]
fn published_scope_is_trimmed_to_match_registrations() {
    let (service, _, catalog) = build_service();
    let rule_set = RuleSet::new(FormKey::new(" CA", "540 ", 2024)).with_rule(Rule::RequiredField(
        RequiredFieldRule::new("taxpayer_name", "Taxpayer name"),
    ));

    service
        .publish_rule_set(rule_set)
        .expect("rule set publishes");

    let stored = catalog
        .rule_set(&FormKey::new("CA", "540", 2024))
        .expect("lookup succeeds")
        .expect("rule set stored under the trimmed scope");
    assert_eq!(stored.key, FormKey::new("CA", "540", 2024));

    let mut payload = registration(FormFields::new());
    payload.jurisdiction = "CA ".to_string();
    payload.form_code = " 540".to_string();
    let record = service.register(payload).expect("registration succeeds");
    let report = service
        .check(&record.document_id, &CheckSelection::all())
        .expect("check finds the published rule set");

    assert_eq!(record.key, FormKey::new("CA", "540", 2024));
    assert_eq!(report.summary.total_issues, 1);
}
