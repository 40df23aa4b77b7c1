//! Shared fixtures for tests and documentation examples.
//!
//! The sample catalog models a small art gallery:
//!
//! ```text
//! Artist ──paintings (1:N)──▶ Painting ──toGallery──▶ Gallery
//!   │                          │  ▲                     │
//!   │                          │  └──paintingArray (1:N)┘
//!   │                          └──toPaintingInfo──▶ PaintingInfo
//!   └──groups (N:M via ARTIST_GROUP)──▶ ArtGroup
//!
//! Person ◀── Employee ◀── Manager      (single table PERSON)
//! ```

use crate::catalog::{EntityCatalog, EntityDescriptor, JoinHop, Relationship, ValueType};

/// Descriptors of the sample catalog.
pub fn sample_descriptors() -> Vec<EntityDescriptor> {
    vec![
        EntityDescriptor::new("Artist", "ARTIST")
            .with_object_class("org.example.art.Artist")
            .with_primary_key("ARTIST_ID")
            .with_attribute("artistName", "ARTIST_NAME", ValueType::String)
            .with_attribute("dateOfBirth", "DATE_OF_BIRTH", ValueType::Date)
            .with_attribute("shortAttribute", "SHORT_ATTR", ValueType::Int16)
            .with_attribute("floatAttribute", "FLOAT_ATTR", ValueType::Float32)
            .with_relationship(Relationship::to_many(
                "paintings",
                "Painting",
                JoinHop::new("paintingArray", "ARTIST", "PAINTING").with_join("ARTIST_ID", "ARTIST_ID"),
            ))
            .with_relationship(
                Relationship::to_many(
                    "groups",
                    "ArtGroup",
                    JoinHop::new("artistGroupArray", "ARTIST", "ARTIST_GROUP")
                        .with_join("ARTIST_ID", "ARTIST_ID"),
                )
                .with_hop(
                    JoinHop::new("toGroup", "ARTIST_GROUP", "ARTGROUP").with_join("GROUP_ID", "GROUP_ID"),
                ),
            ),
        EntityDescriptor::new("Painting", "PAINTING")
            .with_object_class("org.example.art.Painting")
            .with_primary_key("PAINTING_ID")
            .with_attribute("paintingTitle", "PAINTING_TITLE", ValueType::String)
            .with_attribute("estimatedPrice", "ESTIMATED_PRICE", ValueType::Decimal)
            .with_relationship(Relationship::to_one(
                "toArtist",
                "Artist",
                JoinHop::new("toArtist", "PAINTING", "ARTIST").with_join("ARTIST_ID", "ARTIST_ID"),
            ))
            .with_relationship(Relationship::to_one(
                "toGallery",
                "Gallery",
                JoinHop::new("toGallery", "PAINTING", "GALLERY").with_join("GALLERY_ID", "GALLERY_ID"),
            ))
            .with_relationship(Relationship::to_one(
                "toPaintingInfo",
                "PaintingInfo",
                JoinHop::new("toPaintingInfo", "PAINTING", "PAINTING_INFO")
                    .with_join("PAINTING_ID", "PAINTING_ID"),
            )),
        EntityDescriptor::new("Gallery", "GALLERY")
            .with_object_class("org.example.art.Gallery")
            .with_primary_key("GALLERY_ID")
            .with_attribute("galleryName", "GALLERY_NAME", ValueType::String)
            .with_relationship(Relationship::to_many(
                "paintingArray",
                "Painting",
                JoinHop::new("paintingArray", "GALLERY", "PAINTING")
                    .with_join("GALLERY_ID", "GALLERY_ID"),
            )),
        EntityDescriptor::new("PaintingInfo", "PAINTING_INFO")
            .with_object_class("org.example.art.PaintingInfo")
            .with_primary_key("PAINTING_ID")
            .with_attribute("textReview", "TEXT_REVIEW", ValueType::String)
            .with_relationship(Relationship::to_one(
                "painting",
                "Painting",
                JoinHop::new("painting", "PAINTING_INFO", "PAINTING")
                    .with_join("PAINTING_ID", "PAINTING_ID"),
            )),
        EntityDescriptor::new("ArtGroup", "ARTGROUP")
            .with_object_class("org.example.art.ArtGroup")
            .with_primary_key("GROUP_ID")
            .with_attribute("name", "NAME", ValueType::String)
            .with_relationship(Relationship::to_one(
                "toParentGroup",
                "ArtGroup",
                JoinHop::new("toParentGroup", "ARTGROUP", "ARTGROUP")
                    .with_join("PARENT_GROUP_ID", "GROUP_ID"),
            )),
        EntityDescriptor::new("Person", "PERSON")
            .with_primary_key("PERSON_ID")
            .with_discriminator("PERSON_TYPE")
            .with_attribute("name", "NAME", ValueType::String),
        EntityDescriptor::new("Employee", "PERSON")
            .with_super_entity("Person")
            .with_attribute("salary", "SALARY", ValueType::Decimal),
        EntityDescriptor::new("Manager", "PERSON")
            .with_super_entity("Employee")
            .with_attribute("bonus", "BONUS", ValueType::Float32),
    ]
}

/// The sample catalog, validated.
pub fn sample_catalog() -> EntityCatalog {
    EntityCatalog::new(sample_descriptors()).expect("sample catalog is valid")
}
