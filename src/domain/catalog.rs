//! Built-in ticket templates.
//!
//! Free-text hints such as `[Describe the problem]` are placeholders like any
//! other: they disappear when the caller supplies nothing for them.

use crate::domain::template::TicketTemplate;

static TEMPLATES: &[TicketTemplate] = &[
    TicketTemplate {
        id: "bug-report",
        name: "Bug Report",
        issue_type: "Bug",
        priority: "High",
        summary: "[TITEL]",
        description: "**Problem:**
[BESCHREIBUNG]

**Steps to reproduce:**
1. Open [URL]
2. Click [ELEMENT]
3. Observe [BEHAVIOUR]

**Expected behaviour:**
[EXPECTED]

**Actual behaviour:**
[ACTUAL]

**Environment:**
- Browser: [BROWSER]
- Operating system: [OS]

**Additional information:**
[DETAILS]",
        labels: &["bug", "needs-investigation"],
    },
    TicketTemplate {
        id: "feature-request",
        name: "Feature Request",
        issue_type: "Story",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**User story:**
As a **[ROLE]** I want **[CAPABILITY]** so that **[BENEFIT]**.

[BESCHREIBUNG]

**Acceptance criteria:**
- [CRITERION_1]
- [CRITERION_2]
- Tests written
- Documentation updated

**Technical notes:**
[TECHNICAL_NOTES]

**Dependencies:**
[DEPENDENCIES]",
        labels: &["feature", "user-story"],
    },
    TicketTemplate {
        id: "task",
        name: "Task",
        issue_type: "Aufgabe",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**Description:** [BESCHREIBUNG]

**Goal:** [GOAL]

**To do:**
- [STEP_1]
- [STEP_2]

**Definition of done:**
- Implementation finished
- Tests green",
        labels: &["task"],
    },
    TicketTemplate {
        id: "petclinic-bug",
        name: "PetClinic Bug Report",
        issue_type: "Bug",
        priority: "High",
        summary: "[TITEL]",
        description: "**Bug report**

**Affected module:** [MODULE]

[BESCHREIBUNG]

**Steps to reproduce:**
1. [SCHRITT1]
2. [SCHRITT2]
3. [SCHRITT3]

**Expected behaviour:** [ERWARTET]

**Actual behaviour:** [TATSAECHLICH]

**Error message:**
```
[FEHLERMELDUNG]
```

**Environment:**
- URL: http://localhost:8080
- Browser: [BROWSER]",
        labels: &["petclinic", "bug"],
    },
    TicketTemplate {
        id: "petclinic-feature",
        name: "PetClinic Feature",
        issue_type: "Story",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**PetClinic feature request**

**Affected module:** [MODULE]

**User story:**
As a **[ROLE]** I want **[CAPABILITY]** so that **[BENEFIT]**.

[FEATURE_BESCHREIBUNG]

**Acceptance criteria:**
- Frontend implemented
- Backend API available
- Tests written

**Technical details:**
- Controllers: [CONTROLLERS]
- Services: [SERVICES]",
        labels: &["petclinic", "feature"],
    },
    TicketTemplate {
        id: "test-automation",
        name: "Test Automation",
        issue_type: "Aufgabe",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**Test automation**

**Description:** [TEST_BESCHREIBUNG]

**Goal:** [GOAL]

**Scenarios:**
1. Happy path: [HAPPY_PATH]
2. Edge cases: [EDGE_CASES]
3. Error handling: [ERROR_HANDLING]

**Framework:** [FRAMEWORK]

**Definition of done:**
- Tests implemented
- Tests green in CI",
        labels: &["testing", "automation"],
    },
    TicketTemplate {
        id: "playwright-test-failure",
        name: "Playwright Test Failure",
        issue_type: "Bug",
        priority: "High",
        summary: "[TITEL]",
        description: "**Playwright test failure**

**Test details:**
- Test name: [TEST_NAME]
- Test file: [TEST_FILE]
- Browser: [BROWSER]
- Execution time: [EXECUTION_TIME]
- Run ID: [RUN_ID]

**Failure:**
```
[ERROR_MESSAGE]
```

**Screenshot:** [SCREENSHOT]

**Reproduce:**
1. Run `npx playwright test [TEST_FILE]`
2. Use browser [BROWSER]
3. Check for: [ERROR_CONDITION]

**Environment:**
- Runner version: [RUNNER_VERSION]
- Test URL: [TEST_URL]

**History:**
- Flaky status: [FLAKY_STATUS]
- Success rate: [SUCCESS_RATE]

**Possible causes:**
- UI change (selector no longer valid)
- Race condition or timing issue
- Test data problem
- Browser specific problem
- Infrastructure problem",
        labels: &["playwright", "test-failure", "automation", "bug"],
    },
    TicketTemplate {
        id: "playwright-suite-report",
        name: "Playwright Suite Report",
        issue_type: "Aufgabe",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**Playwright suite execution report**

**Suite:**
- Suite name: [SUITE_NAME]
- Execution date: [EXECUTION_DATE]
- Run ID: [RUN_ID]
- Total tests: [TOTAL_TESTS]
- Passed: [PASSED_TESTS]
- Failed: [FAILED_TESTS]
- Skipped: [SKIPPED_TESTS]
- Pass rate: [PASS_RATE]%

**Timing:**
- Total duration: [TOTAL_DURATION]
- Average test time: [AVG_TEST_TIME]
- Slowest test: [SLOWEST_TEST]

**Failed tests:**
- [FAILED_TEST_LIST]

**Flaky tests:** [FLAKY_COUNT]

**Tags:** [SUITE_LABELS]",
        labels: &["playwright", "test-report", "automation", "metrics"],
    },
    TicketTemplate {
        id: "flaky-test-investigation",
        name: "Flaky Test Investigation",
        issue_type: "Aufgabe",
        priority: "High",
        summary: "[TITEL]",
        description: "**Flaky test investigation**

**Test:**
- Test name: [TEST_NAME]
- Test file: [TEST_FILE]
- Current failure rate: [FAILURE_RATE]%
- Detected: [DETECTION_DATE]

**Failure analysis:**
- Total runs: [TOTAL_RUNS]
- Failed runs: [FAILED_RUNS]
- Pattern: [FAILURE_PATTERN]

**Recent failures:**
[RECENT_FAILURES]

**Common errors:**
[COMMON_ERRORS]

**Definition of done:**
- Root cause identified
- Fix implemented
- Success rate above 95%",
        labels: &["playwright", "flaky-test", "investigation", "quality"],
    },
    TicketTemplate {
        id: "performance-investigation",
        name: "Performance Investigation",
        issue_type: "Aufgabe",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**Performance investigation**

**Summary:**
- Slow tests: [SLOW_TEST_COUNT]
- Average duration: [AVG_DURATION]
- Threshold: 30 seconds

**Slow tests:**
[SLOW_TESTS]

**Trend:**
- Baseline: [BASELINE_DURATION]
- Current: [CURRENT_DURATION]
- Degradation: [DEGRADATION_PERCENT]%

**Success criteria:**
- Every test below 30 seconds
- Suite duration reduced by 20%",
        labels: &["playwright", "performance", "optimization"],
    },
    TicketTemplate {
        id: "test-enhancement",
        name: "Test Enhancement",
        issue_type: "Story",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**Test enhancement**

**Details:**
- Feature area: [FEATURE_AREA]
- Enhancement type: [ENHANCEMENT_TYPE]
- Current coverage: [CURRENT_COVERAGE]%
- Target coverage: [TARGET_COVERAGE]%

**Goals:**
[ENHANCEMENT_GOALS]

**New test cases:**
[NEW_TEST_CASES]

**Acceptance criteria:**
- New tests implemented
- Tests pass consistently
- Coverage target met",
        labels: &["playwright", "enhancement", "testing", "coverage"],
    },
    TicketTemplate {
        id: "epic",
        name: "Epic",
        issue_type: "Epic",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**Epic overview**

[BESCHREIBUNG]

**Business value:**
[BUSINESS_VALUE]

**Goals:**
- [GOAL_1]
- [GOAL_2]

**Stakeholders:**
- Product owner: [PRODUCT_OWNER]
- Tech lead: [TECH_LEAD]

**Timeline:**
- Start: [START_DATE]
- End: [END_DATE]

**Risks:**
[RISKS]

**Definition of done:**
- All stories closed
- Acceptance criteria met
- Stakeholder sign-off",
        labels: &["epic", "planning", "strategy"],
    },
    TicketTemplate {
        id: "petclinic-epic",
        name: "PetClinic Epic",
        issue_type: "Epic",
        priority: "Medium",
        summary: "PetClinic Epic: [FEATURE_NAME]",
        description: "**PetClinic epic**

**Feature overview:**
[FEATURE_BESCHREIBUNG]

**Context:**
- Affected areas: [AFFECTED_AREAS]
- Database changes: [DATABASE_CHANGES]
- UI changes: [UI_CHANGES]
- API changes: [API_CHANGES]

**Testing strategy:**
- Unit tests for new services
- Integration tests for the repository layer
- Controller tests for the web layer
- End-to-end tests with Playwright

**Acceptance criteria:**
- Feature complete
- Responsive design
- Page load below 2s",
        labels: &["petclinic", "epic", "feature", "spring-boot"],
    },
    TicketTemplate {
        id: "subtask",
        name: "Sub-Task",
        issue_type: "Sub-task",
        priority: "Medium",
        summary: "[TITEL]",
        description: "**Sub-task**

**Task:**
[BESCHREIBUNG]

**Parent:** [PARENT_KEY]

**Steps:**
1. [STEP_1]
2. [STEP_2]

**Technical details:**
- Component: [COMPONENT]
- Files: [FILES]

**Estimate:** [ESTIMATE] hours",
        labels: &["subtask", "development"],
    },
    TicketTemplate {
        id: "petclinic-subtask",
        name: "PetClinic Sub-Task",
        issue_type: "Sub-task",
        priority: "Medium",
        summary: "PetClinic Sub-Task: [COMPONENT] - [TASK_NAME]",
        description: "**PetClinic sub-task**

**Task:**
[BESCHREIBUNG]

**Parent story:** [PARENT_KEY]

**Implementation:**
- Files: [FILES]
- Methods: [METHODS]
- Endpoints: [ENDPOINTS]

**Definition of done:**
- Code implemented
- Tests written and green
- Code review finished

**Estimate:** [ESTIMATE] hours",
        labels: &["petclinic", "subtask", "spring-boot", "development"],
    },
];

pub fn all() -> &'static [TicketTemplate] {
    TEMPLATES
}

pub fn find(id: &str) -> Option<&'static TicketTemplate> {
    TEMPLATES.iter().find(|template| template.id == id)
}

pub fn ids() -> Vec<&'static str> {
    TEMPLATES.iter().map(|template| template.id).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique() {
        let unique: HashSet<_> = ids().into_iter().collect();
        assert_eq!(unique.len(), all().len());
    }

    #[test]
    fn finds_known_template() {
        let template = find("playwright-test-failure").unwrap();
        assert_eq!(template.issue_type, "Bug");
        assert!(template.labels.contains(&"test-failure"));
        assert!(find("does-not-exist").is_none());
    }

    #[test]
    fn every_template_has_labels_and_summary() {
        for template in all() {
            assert!(!template.labels.is_empty(), "{} has no labels", template.id);
            assert!(!template.summary.is_empty(), "{} has no summary", template.id);
        }
    }

    #[test]
    fn sub_task_templates_reference_parent() {
        for id in ["subtask", "petclinic-subtask"] {
            assert!(find(id).unwrap().description.contains("[PARENT_KEY]"));
        }
    }
}
