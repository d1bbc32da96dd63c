//! Validation of the box metadata files a title writes with the check flag set.
//!
//! Fields the title left unset or got wrong are repaired in place; files shorter than their
//! header are left unchanged.

use super::store::BoxStore;
use super::{CecDataPathType, ROOT_DIR};

const MBOX_LIST_MAGIC: u16 = 0x6868;
const MBOX_INFO_MAGIC: u16 = 0x6363;
const BOX_INFO_MAGIC: u16 = 0x6262;
const OB_INDEX_MAGIC: u16 = 0x6767;

const MBOX_LIST_SIZE: usize = 0x18C;
const MBOX_LIST_NAMES_OFFSET: usize = 0xC;
const MBOX_INFO_SIZE: usize = 0x60;
const BOX_INFO_SIZE: usize = 0x20;
const OB_INDEX_HEADER_SIZE: usize = 0x8;
const OB_INDEX_ENTRY_SIZE: usize = 0x8;

const MAX_BOXES: usize = 24;
const BOX_NAME_SIZE: usize = 16;
/// Only the first half of a box name holds the title id; the rest is nul.
const BOX_NAME_VALID: usize = 8;

const MBOX_LIST_NAME: &str = "MBoxList____";

fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn set_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn set_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Entries an outbox index of `file_size` bytes holds after its header.
pub fn ob_index_message_count(file_size: usize) -> u32 {
    (file_size.saturating_sub(OB_INDEX_HEADER_SIZE) / OB_INDEX_ENTRY_SIZE) as u32
}

pub fn check_and_update_file(
    path_type: CecDataPathType,
    ncch_program_id: u32,
    buf: &mut [u8],
    store: &BoxStore,
) {
    match path_type {
        CecDataPathType::MboxList => check_mbox_list(ncch_program_id, buf, store),
        CecDataPathType::MboxInfo => check_mbox_info(ncch_program_id, buf),
        CecDataPathType::InboxInfo | CecDataPathType::OutboxInfo => check_box_info(buf),
        CecDataPathType::OutboxIndex => check_ob_index(buf),
        _ => {}
    }
}

fn check_mbox_list(ncch_program_id: u32, buf: &mut [u8], store: &BoxStore) {
    if buf.len() < MBOX_LIST_SIZE {
        tracing::debug!(size = buf.len(), "mbox list is too small");
        return;
    }
    if u16_at(buf, 0) != MBOX_LIST_MAGIC {
        tracing::debug!(magic = u16_at(buf, 0), "mbox list magic is not set");
        buf[..MBOX_LIST_SIZE].fill(0);
        set_u16(buf, 0, MBOX_LIST_MAGIC);
    }
    if u16_at(buf, 4) != 1 {
        set_u16(buf, 4, 1);
    }

    let mut num_boxes = u16_at(buf, 8) as usize;
    if num_boxes > MAX_BOXES {
        tracing::debug!(num_boxes, "mbox list holds too many boxes");
        return;
    }
    let name_at = |i: usize| MBOX_LIST_NAMES_OFFSET + i * BOX_NAME_SIZE;

    if ncch_program_id != 0 {
        let name = format!("{ncch_program_id:08x}");
        let activated = (0..num_boxes)
            .any(|i| &buf[name_at(i)..name_at(i) + BOX_NAME_VALID] == name.as_bytes());
        if !activated && num_boxes < MAX_BOXES {
            tracing::debug!(%name, "adding title to mbox list");
            let slot = &mut buf[name_at(num_boxes)..name_at(num_boxes) + BOX_NAME_SIZE];
            slot.fill(0);
            slot[..BOX_NAME_VALID].copy_from_slice(name.as_bytes());
            num_boxes += 1;
        }
    } else {
        // Rebuild from the boxes present on storage.
        num_boxes = 0;
        for entry in store.entries(ROOT_DIR) {
            if entry == MBOX_LIST_NAME || num_boxes == MAX_BOXES {
                continue;
            }
            let slot = &mut buf[name_at(num_boxes)..name_at(num_boxes) + BOX_NAME_SIZE];
            slot.fill(0);
            let len = entry.len().min(BOX_NAME_VALID);
            slot[..len].copy_from_slice(&entry.as_bytes()[..len]);
            num_boxes += 1;
        }
    }
    set_u16(buf, 8, num_boxes as u16);
}

fn check_mbox_info(ncch_program_id: u32, buf: &mut [u8]) {
    if buf.len() < MBOX_INFO_SIZE {
        tracing::debug!(size = buf.len(), "mbox info is too small");
        return;
    }
    if u16_at(buf, 0) != MBOX_INFO_MAGIC {
        set_u16(buf, 0, MBOX_INFO_MAGIC);
    }
    let program_id = u32_at(buf, 4);
    if program_id != ncch_program_id {
        tracing::debug!(program_id, ncch_program_id, "mbox info program id does not match");
    }
}

fn check_box_info(buf: &mut [u8]) {
    if buf.len() < BOX_INFO_SIZE {
        tracing::debug!(size = buf.len(), "box info is too small");
        return;
    }
    if u16_at(buf, 0) != BOX_INFO_MAGIC {
        set_u16(buf, 0, BOX_INFO_MAGIC);
    }
    if u32_at(buf, 4) as usize != buf.len() {
        set_u32(buf, 4, BOX_INFO_SIZE as u32);
    }
    let max_message_num = u32_at(buf, 0x10);
    if u32_at(buf, 0x18) == 0 {
        // Batch size defaults to the message limit.
        set_u32(buf, 0x18, max_message_num);
    }
}

fn check_ob_index(buf: &mut [u8]) {
    if buf.len() < OB_INDEX_HEADER_SIZE {
        tracing::debug!(size = buf.len(), "outbox index is too small");
        return;
    }
    if u16_at(buf, 0) != OB_INDEX_MAGIC {
        set_u16(buf, 0, OB_INDEX_MAGIC);
    }
    let expected = ob_index_message_count(buf.len());
    let message_num = u32_at(buf, 4);
    if message_num == 0 {
        if buf.len() > OB_INDEX_HEADER_SIZE {
            set_u32(buf, 4, expected);
        }
    } else if message_num != expected {
        tracing::debug!(message_num, expected, "outbox index message count is wrong");
    }
}
