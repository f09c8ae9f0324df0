//! Classification and row transformation shared by both ingestion drivers

use crate::models::{
    ClassifiedInstance, ExhibitionEvent, Interaction, RatingInstance, SupportInstance,
};

/// Offset between zero-based kiosk encodings and one-based storage keys
pub const ID_SHIFT: i32 = 1;

/// Split a validated event into a rating or a support request
///
/// `val == -1` means support, anything else is a rating.
pub fn classify(event: &ExhibitionEvent) -> Interaction {
    event.interaction()
}

/// Map a classified interaction to its storage row
///
/// This is the only place the id shift is applied.
pub fn transform(interaction: Interaction) -> ClassifiedInstance {
    match interaction {
        Interaction::Rating {
            created_at,
            site,
            rating,
        } => ClassifiedInstance::Rating(RatingInstance {
            rating_created_at: created_at,
            exhibition_id: shift_id(site),
            rating_type_id: shift_id(rating),
        }),
        Interaction::Support {
            created_at,
            site,
            support_type,
        } => ClassifiedInstance::Support(SupportInstance {
            instance_created_at: created_at,
            exhibition_id: shift_id(site),
            support_type_id: shift_id(support_type),
        }),
    }
}

/// Classify and transform in one step
pub fn to_instance(event: &ExhibitionEvent) -> ClassifiedInstance {
    transform(classify(event))
}

fn shift_id(domain_id: u8) -> i32 {
    i32::from(domain_id) + ID_SHIFT
}
