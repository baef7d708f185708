//! Content service tests over the in-memory backend

use pretty_assertions::assert_eq;
use rapidx_site::auth::ManualClock;
use rapidx_site::content::{
    BlogPost, ContentHub, ContentKind, ContentService, MemoryBackend, Partner, Review, Row,
};
use rapidx_site::SiteError;
use rstest::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    hub: ContentHub,
    backend: Arc<MemoryBackend>,
    clock: Arc<ManualClock>,
}

#[fixture]
fn fixture() -> Fixture {
    let backend = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::default());
    Fixture {
        hub: ContentHub::with_clock(backend.clone(), clock.clone()),
        backend,
        clock,
    }
}

fn row(value: Value) -> Row {
    value.as_object().cloned().expect("object literal")
}

#[rstest]
#[tokio::test]
async fn test_blog_lifecycle(fixture: Fixture) {
    let posts: &ContentService<BlogPost> = &fixture.hub.blog;

    let draft = posts
        .create(row(json!({
            "title": "Shipping a CMS in a Weekend",
            "content": "It started with a spreadsheet.",
            "tags": ["cms", "rust"],
        })))
        .await
        .unwrap();
    assert_eq!(draft.slug, "shipping-a-cms-in-a-weekend");
    assert!(posts.list_published().await.unwrap().is_empty());

    let published = posts.toggle_field(&draft.id, "published").await.unwrap();
    assert!(published.published);
    assert_eq!(published.tags, vec!["cms", "rust"]);

    let listed = posts.list_published().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(
        posts
            .get_by_slug_or_id("shipping-a-cms-in-a-weekend")
            .await
            .unwrap()
            .map(|p| p.id),
        Some(draft.id.clone())
    );

    posts.delete(&draft.id).await.unwrap();
    assert!(posts.get_by_slug_or_id(&draft.id).await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn test_reviews_listed_by_display_order(fixture: Fixture) {
    let reviews: &ContentService<Review> = &fixture.hub.reviews;
    for (name, order) in [("Casey", 3), ("Alex", 1), ("Blair", 2)] {
        reviews
            .create(row(json!({
                "client_name": name,
                "content": "Delivered on time",
                "rating": 5,
                "display_order": order,
                "published": true,
            })))
            .await
            .unwrap();
        fixture.clock.advance(Duration::from_secs(1));
    }

    let names: Vec<_> = reviews
        .list_published()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.client_name)
        .collect();
    assert_eq!(names, vec!["Alex", "Blair", "Casey"]);
}

#[rstest]
#[case(json!({"client_name": "Dana", "content": "Great", "rating": 6}))]
#[case(json!({"client_name": "", "content": "Great", "rating": 4}))]
#[case(json!({"content": "Missing a name", "rating": 4}))]
#[tokio::test]
async fn test_invalid_reviews_rejected(fixture: Fixture, #[case] fields: Value) {
    let err = fixture.hub.reviews.create(row(fields)).await.unwrap_err();
    assert!(matches!(err, SiteError::InvalidInput(_)), "got {err:?}");
    assert!(fixture.hub.reviews.list_all().await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_partial_update_keeps_other_fields(fixture: Fixture) {
    let partners: &ContentService<Partner> = &fixture.hub.partners;
    let acme = partners
        .create(row(json!({
            "name": "Acme",
            "logo_url": "https://cdn.example.com/acme.svg",
            "website_url": "https://acme.example.com",
        })))
        .await
        .unwrap();

    let renamed = partners
        .update(&acme.id, row(json!({"name": "Acme Corp"})))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Acme Corp");
    assert_eq!(renamed.logo_url, acme.logo_url);
    assert_eq!(renamed.website_url, acme.website_url);

    let err = partners
        .update("missing", row(json!({"name": "Ghost"})))
        .await
        .unwrap_err();
    assert!(matches!(err, SiteError::NotFound(_)));
}

#[rstest]
#[tokio::test]
async fn test_slug_change_checks_collisions(fixture: Fixture) {
    let projects = &fixture.hub.projects;
    let first = projects
        .create(row(json!({"title": "Data Platform"})))
        .await
        .unwrap();
    let second = projects
        .create(row(json!({"title": "Mobile App"})))
        .await
        .unwrap();

    let err = projects
        .update(&second.id, row(json!({"slug": first.slug})))
        .await
        .unwrap_err();
    assert!(matches!(err, SiteError::InvalidInput(_)));

    let renamed = projects
        .update(&second.id, row(json!({"slug": "mobile-app-v2"})))
        .await
        .unwrap();
    assert_eq!(renamed.slug, "mobile-app-v2");
}

#[rstest]
#[tokio::test]
async fn test_outage_surfaces_retryable_error(fixture: Fixture) {
    fixture.backend.set_unavailable(true);
    for kind in ContentKind::ALL {
        let err = fixture
            .hub
            .collection(kind)
            .list_published_json()
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{kind}: {err:?}");
    }

    fixture.backend.set_unavailable(false);
    assert!(fixture.hub.projects.list_all().await.is_ok());
}
