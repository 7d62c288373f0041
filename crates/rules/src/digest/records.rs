//! Record kinds a digest can be built from.

use chrono::{DateTime, Utc};
use vigil_core::{Category, Finding, FindingDetail, PolicyViolation, ProjectRef, Severity, ViolationDetail, ViolationType};

/// A finding-like record: owned by one project, classified by a category,
/// optionally suppressed.
pub trait DigestRecord {
    type Category: Category;
    type Detail;

    fn project(&self) -> &ProjectRef;
    fn timestamp(&self) -> DateTime<Utc>;
    fn category(&self) -> Self::Category;
    fn has_component(&self) -> bool;
    fn is_suppressed(&self) -> bool;
    fn to_detail(&self) -> Self::Detail;
}

impl DigestRecord for Finding {
    type Category = Severity;
    type Detail = FindingDetail;

    fn project(&self) -> &ProjectRef {
        &self.project
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.attributed_on
    }

    fn category(&self) -> Severity {
        self.severity
    }

    fn has_component(&self) -> bool {
        self.component.is_some()
    }

    fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    fn to_detail(&self) -> FindingDetail {
        FindingDetail {
            component: self.component.clone(),
            vulnerability: self.vulnerability.clone(),
            severity: self.severity,
            attributed_on: self.attributed_on,
            analysis_state: self.analysis_state,
            suppressed: self.suppressed,
        }
    }
}

impl DigestRecord for PolicyViolation {
    type Category = ViolationType;
    type Detail = ViolationDetail;

    fn project(&self) -> &ProjectRef {
        &self.project
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn category(&self) -> ViolationType {
        self.violation_type
    }

    fn has_component(&self) -> bool {
        self.component.is_some()
    }

    fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    fn to_detail(&self) -> ViolationDetail {
        ViolationDetail {
            component: self.component.clone(),
            policy_name: self.policy_name.clone(),
            condition: self.condition.clone(),
            violation_type: self.violation_type,
            timestamp: self.timestamp,
            analysis_state: self.analysis_state,
            suppressed: self.suppressed,
        }
    }
}
