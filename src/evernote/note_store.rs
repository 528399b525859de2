//! `NoteStore.createNote` over Thrift's binary protocol.
//!
//! Only the fields this service sends or reads are modelled; everything
//! else in a reply is skipped.

use thrift::protocol::{
    TBinaryInputProtocol, TBinaryOutputProtocol, TFieldIdentifier, TInputProtocol,
    TListIdentifier, TMessageIdentifier, TMessageType, TOutputProtocol, TStructIdentifier, TType,
};

use super::note::NoteDraft;
use super::{EdamErrorCode, EvernoteError};

pub const CONTENT_TYPE: &str = "application/x-thrift";

const CREATE_NOTE: &str = "createNote";

// Note
const NOTE_GUID: i16 = 1;
const NOTE_TITLE: i16 = 2;
const NOTE_CONTENT: i16 = 3;
const NOTE_NOTEBOOK_GUID: i16 = 11;
const NOTE_ATTRIBUTES: i16 = 14;
const NOTE_TAG_NAMES: i16 = 15;
// NoteAttributes
const ATTRIBUTES_SOURCE_URL: i16 = 15;

/// What we keep from the note Evernote echoes back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatedNote {
    pub guid: Option<String>,
    pub title: Option<String>,
}

fn field(name: &str, field_type: TType, id: i16) -> TFieldIdentifier {
    TFieldIdentifier::new(name, field_type, id)
}

/// Serialize a `createNote(authenticationToken, note)` call.
pub fn encode_create_note(
    auth_token: &str,
    note: &NoteDraft,
    sequence: i32,
) -> Result<Vec<u8>, EvernoteError> {
    let mut buf = Vec::new();
    {
        let mut o = TBinaryOutputProtocol::new(&mut buf, true);
        o.write_message_begin(&TMessageIdentifier::new(
            CREATE_NOTE,
            TMessageType::Call,
            sequence,
        ))?;
        o.write_struct_begin(&TStructIdentifier::new("createNote_args"))?;

        o.write_field_begin(&field("authenticationToken", TType::String, 1))?;
        o.write_string(auth_token)?;
        o.write_field_end()?;

        o.write_field_begin(&field("note", TType::Struct, 2))?;
        write_note(&mut o, note)?;
        o.write_field_end()?;

        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_message_end()?;
        o.flush()?;
    }
    Ok(buf)
}

fn write_note(o: &mut dyn TOutputProtocol, note: &NoteDraft) -> Result<(), EvernoteError> {
    o.write_struct_begin(&TStructIdentifier::new("Note"))?;

    o.write_field_begin(&field("title", TType::String, NOTE_TITLE))?;
    o.write_string(&note.title)?;
    o.write_field_end()?;

    o.write_field_begin(&field("content", TType::String, NOTE_CONTENT))?;
    o.write_string(&note.content)?;
    o.write_field_end()?;

    if let Some(guid) = &note.notebook_guid {
        o.write_field_begin(&field("notebookGuid", TType::String, NOTE_NOTEBOOK_GUID))?;
        o.write_string(guid)?;
        o.write_field_end()?;
    }

    if let Some(url) = &note.source_url {
        o.write_field_begin(&field("attributes", TType::Struct, NOTE_ATTRIBUTES))?;
        o.write_struct_begin(&TStructIdentifier::new("NoteAttributes"))?;
        o.write_field_begin(&field("sourceURL", TType::String, ATTRIBUTES_SOURCE_URL))?;
        o.write_string(url)?;
        o.write_field_end()?;
        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_field_end()?;
    }

    if !note.tag_names.is_empty() {
        o.write_field_begin(&field("tagNames", TType::List, NOTE_TAG_NAMES))?;
        o.write_list_begin(&TListIdentifier::new(
            TType::String,
            note.tag_names.len() as i32,
        ))?;
        for tag in &note.tag_names {
            o.write_string(tag)?;
        }
        o.write_list_end()?;
        o.write_field_end()?;
    }

    o.write_field_stop()?;
    o.write_struct_end()?;
    Ok(())
}

/// Parse the reply to a `createNote` call.
pub fn decode_create_note_reply(body: &[u8]) -> Result<CreatedNote, EvernoteError> {
    let mut i = TBinaryInputProtocol::new(body, true);
    let message = i.read_message_begin()?;

    if message.message_type == TMessageType::Exception {
        return Err(read_application_exception(&mut i)?);
    }
    if message.message_type != TMessageType::Reply || message.name != CREATE_NOTE {
        return Err(EvernoteError::Protocol(format!(
            "unexpected message {:?} ({:?})",
            message.name, message.message_type
        )));
    }

    let mut created = None;
    let mut failure = None;

    i.read_struct_begin()?;
    loop {
        let f = i.read_field_begin()?;
        if f.field_type == TType::Stop {
            break;
        }
        match (f.id, f.field_type) {
            (Some(0), TType::Struct) => created = Some(read_created_note(&mut i)?),
            (Some(1), TType::Struct) => failure = Some(read_user_exception(&mut i)?),
            (Some(2), TType::Struct) => failure = Some(read_system_exception(&mut i)?),
            (Some(3), TType::Struct) => failure = Some(read_not_found_exception(&mut i)?),
            (_, other) => i.skip(other)?,
        }
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    i.read_message_end()?;

    match (created, failure) {
        (_, Some(err)) => Err(err),
        (Some(note), None) => Ok(note),
        (None, None) => Err(EvernoteError::Application {
            kind: 5,
            message: "createNote failed: unknown result".into(),
        }),
    }
}

/// Walk a struct's fields, handing each one to `visit`. Fields the visitor
/// doesn't consume must be skipped by it.
fn read_struct<F>(i: &mut dyn TInputProtocol, mut visit: F) -> Result<(), EvernoteError>
where
    F: FnMut(&mut dyn TInputProtocol, i16, TType) -> Result<(), EvernoteError>,
{
    i.read_struct_begin()?;
    loop {
        let f = i.read_field_begin()?;
        if f.field_type == TType::Stop {
            break;
        }
        visit(i, f.id.unwrap_or(-1), f.field_type)?;
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    Ok(())
}

fn read_created_note(i: &mut dyn TInputProtocol) -> Result<CreatedNote, EvernoteError> {
    let mut note = CreatedNote::default();
    read_struct(i, |i, id, ty| {
        match (id, ty) {
            (NOTE_GUID, TType::String) => note.guid = Some(i.read_string()?),
            (NOTE_TITLE, TType::String) => note.title = Some(i.read_string()?),
            (_, other) => i.skip(other)?,
        }
        Ok(())
    })?;
    Ok(note)
}

fn read_user_exception(i: &mut dyn TInputProtocol) -> Result<EvernoteError, EvernoteError> {
    let mut code = EdamErrorCode::Unknown;
    let mut parameter = None;
    read_struct(i, |i, id, ty| {
        match (id, ty) {
            (1, TType::I32) => code = EdamErrorCode::from_i32(i.read_i32()?),
            (2, TType::String) => parameter = Some(i.read_string()?),
            (_, other) => i.skip(other)?,
        }
        Ok(())
    })?;
    Ok(EvernoteError::User { code, parameter })
}

fn read_system_exception(i: &mut dyn TInputProtocol) -> Result<EvernoteError, EvernoteError> {
    let mut code = EdamErrorCode::Unknown;
    let mut message = None;
    let mut rate_limit_duration = None;
    read_struct(i, |i, id, ty| {
        match (id, ty) {
            (1, TType::I32) => code = EdamErrorCode::from_i32(i.read_i32()?),
            (2, TType::String) => message = Some(i.read_string()?),
            (3, TType::I32) => rate_limit_duration = Some(i.read_i32()?),
            (_, other) => i.skip(other)?,
        }
        Ok(())
    })?;
    Ok(EvernoteError::System {
        code,
        message,
        rate_limit_duration,
    })
}

fn read_not_found_exception(i: &mut dyn TInputProtocol) -> Result<EvernoteError, EvernoteError> {
    let mut identifier = None;
    let mut key = None;
    read_struct(i, |i, id, ty| {
        match (id, ty) {
            (1, TType::String) => identifier = Some(i.read_string()?),
            (2, TType::String) => key = Some(i.read_string()?),
            (_, other) => i.skip(other)?,
        }
        Ok(())
    })?;
    Ok(EvernoteError::NotFound { identifier, key })
}

fn read_application_exception(i: &mut dyn TInputProtocol) -> Result<EvernoteError, EvernoteError> {
    let mut kind = 0;
    let mut message = String::new();
    read_struct(i, |i, id, ty| {
        match (id, ty) {
            (1, TType::String) => message = i.read_string()?,
            (2, TType::I32) => kind = i.read_i32()?,
            (_, other) => i.skip(other)?,
        }
        Ok(())
    })?;
    i.read_message_end()?;
    Ok(EvernoteError::Application { kind, message })
}
