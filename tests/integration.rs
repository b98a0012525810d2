//! Cross-module, end-to-end scenarios that don't belong to any single
//! component's `#[cfg(test)]` module: full round-trips through load/save,
//! the security state machine, brute-force recovery, and object streams.

use pdf_core::{dictionary, Document, Object, ProtectionOptions};

fn minimal_document() -> Document {
    let mut doc = Document::new();
    let pages_id = doc.add_object(dictionary! { "Type" => "Pages", "Kids" => Object::from(vec![]), "Count" => 0 });
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn set_info_title(doc: &mut Document, title: &str) {
    let id = doc.trailer.get(b"Info").and_then(|o| o.as_reference()).ok();
    let id = match id {
        Some(id) => id,
        None => {
            let id = doc.add_object(dictionary! {});
            doc.trailer.set("Info", id);
            id
        }
    };
    let info = doc.get_object_mut(id).unwrap().as_dict_mut().unwrap();
    info.set("Title", Object::string_literal(title.as_bytes().to_vec()));
}

fn get_info_title(doc: &Document) -> Option<String> {
    let id = doc.trailer.get(b"Info").and_then(|o| o.as_reference()).ok()?;
    let info = doc.get_dictionary(id).ok()?;
    let bytes = info.get(b"Title").and_then(Object::as_str).ok()?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Scenario 1: the smallest valid document (empty page tree) round-trips
/// with the same page count and no warnings.
#[test]
fn minimal_round_trip_preserves_page_count_and_has_no_warnings() {
    let mut doc = minimal_document();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.get_pages().len(), 0);
    assert_eq!(reloaded.version, "1.7");
    assert!(reloaded.warnings.is_empty());
    assert_eq!(reloaded.catalog().unwrap().get_type().unwrap(), b"Catalog");
}

/// Scenario 2: an incremental save after a small in-memory edit must leave
/// every byte of the original file untouched and merely append after it.
#[test]
fn incremental_save_preserves_original_prefix_and_chains_prev() {
    let mut doc = minimal_document();
    let mut original = Vec::new();
    doc.save_to(&mut original).unwrap();
    let original_len = original.len();

    let mut doc = Document::load_mem(&original).unwrap();
    set_info_title(&mut doc, "Modified");

    let mut updated = Vec::new();
    doc.save_incremental(&mut updated).unwrap();

    assert!(updated.len() > original_len);
    assert_eq!(&updated[..original_len], &original[..]);
    let tail = String::from_utf8_lossy(&updated[original_len..]);
    assert!(tail.contains("/Prev"));

    let reloaded = Document::load_mem(&updated).unwrap();
    assert_eq!(get_info_title(&reloaded).as_deref(), Some("Modified"));

    // Objects untouched by this save (the Pages dict, the Catalog) must
    // still resolve: the new xref section only carries the Info dict, so
    // it must not also mark every other, unrelated object number free.
    assert!(reloaded.catalog().is_ok());
    assert_eq!(reloaded.get_pages().len(), 0);
}

/// An incremental save of a document with nothing dirty must be a pure
/// no-op: exactly the original bytes, no new revision appended.
#[test]
fn incremental_save_with_no_changes_returns_original_bytes() {
    let mut doc = minimal_document();
    let mut original = Vec::new();
    doc.save_to(&mut original).unwrap();

    let mut doc = Document::load_mem(&original).unwrap();
    let mut resaved = Vec::new();
    doc.save_incremental(&mut resaved).unwrap();

    assert_eq!(resaved, original);
}

/// Scenario 3 (partial, single-password form): `set_protection` followed by
/// `authenticate` round-trips through the four-state security machine, and
/// a wrong password leaves the state unchanged rather than erroring.
#[test]
fn aes256_protection_authenticate_round_trip() {
    let mut doc = minimal_document();
    let opts = ProtectionOptions::builder().user_password("user").owner_password("owner").build();
    doc.set_protection(opts).unwrap();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let mut reloaded = Document::load_mem(&bytes).unwrap();
    assert!(reloaded.is_encrypted());
    assert_eq!(reloaded.get_security().algorithm, "AES-256");

    let wrong = reloaded.authenticate("wrong").unwrap();
    assert!(!wrong.authenticated);

    let user = reloaded.authenticate("user").unwrap();
    assert!(user.authenticated);
    assert!(!user.is_owner);

    let mut reloaded_owner = Document::load_mem(&bytes).unwrap();
    let owner = reloaded_owner.authenticate("owner").unwrap();
    assert!(owner.authenticated);
    assert!(owner.is_owner);
}

/// Scenario 4: an xref section that's pure garbage forces brute-force
/// recovery, which must still produce a readable catalog, a non-empty
/// warnings list, and a document that refuses incremental save.
#[test]
fn corrupt_xref_recovers_via_brute_force_scan() {
    let mut doc = minimal_document();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let text = String::from_utf8(bytes).unwrap();
    let xref_pos = text.find("\nxref\n").unwrap() + 1;
    let eof_pos = text[xref_pos..].find("startxref").unwrap() + xref_pos;
    let mut corrupted = text[..xref_pos].to_string();
    corrupted.push_str("xref\nGARBAGE\n");
    corrupted.push_str(&text[eof_pos..]);

    let reloaded = Document::load_mem(corrupted.as_bytes()).unwrap();
    assert!(!reloaded.warnings.is_empty());
    assert!(reloaded.recovered_via_brute_force);
    assert_eq!(reloaded.incremental_save_blocker(), Some("brute-force-recovery"));
    assert!(reloaded.catalog().is_ok());
}

/// Scenario 5: removing protection from an encrypted document drops
/// `/Encrypt` and leaves the page count untouched.
#[test]
fn removing_protection_drops_encrypt_dict() {
    let mut doc = minimal_document();
    let opts = ProtectionOptions::builder().user_password("secret").owner_password("admin").build();
    doc.set_protection(opts).unwrap();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let mut reloaded = Document::load_mem(&bytes).unwrap();
    reloaded.authenticate("admin").unwrap();
    assert!(reloaded.has_owner_access());
    reloaded.remove_protection().unwrap();

    let mut stripped = Vec::new();
    reloaded.save_to(&mut stripped).unwrap();

    let final_doc = Document::load_mem(&stripped).unwrap();
    assert!(!final_doc.is_encrypted());
    assert_eq!(final_doc.get_pages().len(), 0);
}

/// Scenario 6: a full rewrite with `use_object_streams` packs the catalog
/// and pages dict into a compressed `/ObjStm`; loading it back must still
/// resolve the catalog and its full page count through the xref's
/// compressed-entry path.
#[test]
fn object_stream_round_trip_resolves_compressed_catalog() {
    let mut doc = minimal_document();
    doc.add_page(dictionary! {}).unwrap();
    doc.add_page(dictionary! {}).unwrap();

    let mut bytes = Vec::new();
    let options = pdf_core::SaveOptions::builder().use_object_streams(true).build();
    doc.save_with_options(&mut bytes, options).unwrap();

    let reloaded = Document::load_mem(&bytes).unwrap();
    assert_eq!(reloaded.catalog().unwrap().get_type().unwrap(), b"Catalog");
    assert_eq!(reloaded.get_pages().len(), 2);
}
