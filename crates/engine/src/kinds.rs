//! The entity kinds the engine ships with. Each is one crosswalk table; the
//! behaviour is identical across kinds and only names and key layouts vary.
//!
//! | kind | legacy key | new key | parent | owner |
//! |---|---|---|---|---|
//! | court cases | case id | string | - | offender no |
//! | court appearances | event id | string | court case | offender no |
//! | court charges | charge id | string | court case | offender no |
//! | sentences | (booking, sequence) | string | court case | offender no |
//! | sentence terms | (booking, sequence, term) | string | sentence | offender no |
//! | alerts | (booking, sequence) | uuid | - | offender no |
//! | temporary absence applications | application id | uuid | booking | offender no |
//! | temporary absence movements | (booking, sequence) | uuid | booking | offender no |
//! | profile detail sync | (booking, profile type) | string | - | offender no |

use std::time::Duration;

use crosswalk_storage::{Column, MappingKind};

pub static COURT_CASES: MappingKind = MappingKind {
    table: "court_case_mapping",
    legacy: &[Column::integer("nomis_court_case_id", "nomisCourtCaseId")],
    new: &[Column::text("dps_court_case_id", "dpsCourtCaseId")],
    parent: None,
    owner: Some("offenderNo"),
    retention: None,
};

pub static COURT_APPEARANCES: MappingKind = MappingKind {
    table: "court_appearance_mapping",
    legacy: &[Column::integer("nomis_court_appearance_id", "nomisCourtAppearanceId")],
    new: &[Column::text("dps_court_appearance_id", "dpsCourtAppearanceId")],
    parent: Some("dpsCourtCaseId"),
    owner: Some("offenderNo"),
    retention: None,
};

pub static COURT_CHARGES: MappingKind = MappingKind {
    table: "court_charge_mapping",
    legacy: &[Column::integer("nomis_court_charge_id", "nomisCourtChargeId")],
    new: &[Column::text("dps_court_charge_id", "dpsCourtChargeId")],
    parent: Some("dpsCourtCaseId"),
    owner: Some("offenderNo"),
    retention: None,
};

pub static SENTENCES: MappingKind = MappingKind {
    table: "sentence_mapping",
    legacy: &[
        Column::integer("nomis_booking_id", "nomisBookingId"),
        Column::integer("nomis_sentence_sequence", "nomisSentenceSequence"),
    ],
    new: &[Column::text("dps_sentence_id", "dpsSentenceId")],
    parent: Some("dpsCourtCaseId"),
    owner: Some("offenderNo"),
    retention: None,
};

pub static SENTENCE_TERMS: MappingKind = MappingKind {
    table: "sentence_term_mapping",
    legacy: &[
        Column::integer("nomis_booking_id", "nomisBookingId"),
        Column::integer("nomis_sentence_sequence", "nomisSentenceSequence"),
        Column::integer("nomis_term_sequence", "nomisTermSequence"),
    ],
    new: &[Column::text("dps_term_id", "dpsTermId")],
    parent: Some("dpsSentenceId"),
    owner: Some("offenderNo"),
    retention: None,
};

pub static ALERTS: MappingKind = MappingKind {
    table: "alert_mapping",
    legacy: &[
        Column::integer("nomis_booking_id", "nomisBookingId"),
        Column::integer("nomis_alert_sequence", "nomisAlertSequence"),
    ],
    new: &[Column::text("dps_alert_id", "dpsAlertId")],
    parent: None,
    owner: Some("offenderNo"),
    retention: None,
};

pub static TEMPORARY_ABSENCE_APPLICATIONS: MappingKind = MappingKind {
    table: "temporary_absence_application_mapping",
    legacy: &[Column::integer("nomis_application_id", "nomisMovementApplicationId")],
    new: &[Column::text("dps_application_id", "dpsMovementApplicationId")],
    parent: Some("bookingId"),
    owner: Some("prisonerNumber"),
    retention: None,
};

pub static TEMPORARY_ABSENCE_MOVEMENTS: MappingKind = MappingKind {
    table: "temporary_absence_movement_mapping",
    legacy: &[
        Column::integer("nomis_booking_id", "nomisBookingId"),
        Column::integer("nomis_movement_seq", "nomisMovementSeq"),
    ],
    new: &[Column::text("dps_movement_id", "dpsMovementId")],
    parent: Some("bookingId"),
    owner: Some("prisonerNumber"),
    retention: None,
};

/// Sync bookkeeping only; rows are useless once the sync has settled.
pub static PROFILE_DETAIL_SYNC: MappingKind = MappingKind {
    table: "profile_detail_sync_mapping",
    legacy: &[
        Column::integer("nomis_booking_id", "nomisBookingId"),
        Column::text("nomis_profile_type", "nomisProfileType"),
    ],
    new: &[Column::text("dps_id", "dpsId")],
    parent: None,
    owner: Some("offenderNo"),
    retention: Some(Duration::from_secs(28 * 24 * 60 * 60)),
};

pub static ALL: [&MappingKind; 9] = [
    &COURT_CASES,
    &COURT_APPEARANCES,
    &COURT_CHARGES,
    &SENTENCES,
    &SENTENCE_TERMS,
    &ALERTS,
    &TEMPORARY_ABSENCE_APPLICATIONS,
    &TEMPORARY_ABSENCE_MOVEMENTS,
    &PROFILE_DETAIL_SYNC,
];

pub fn by_table(table: &str) -> Option<&'static MappingKind> {
    ALL.iter().copied().find(|k| k.table == table)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn table_names_are_unique() {
        let names: HashSet<_> = ALL.iter().map(|k| k.table).collect();
        assert_eq!(names.len(), ALL.len());
    }

    #[test]
    fn lookup_by_table_name() {
        assert_eq!(by_table("sentence_mapping").map(|k| k.table), Some(SENTENCES.table));
        assert!(by_table("nope").is_none());
    }
}
