//! Page writer properties against the simulated flash

use lorashim_core::flash::layout::{page_address, INACTIVE_BANK_BASE, PAGE_SIZE};
use lorashim_core::flash::PageWriter;
use lorashim_core::sim::SimFlash;
use lorashim_hal::{Bank, FlashControl};
use proptest::prelude::*;

/// Pages the properties write into
const PAGES: u16 = 6;

fn seeded_flash(seed: u8) -> SimFlash {
    let mut flash = SimFlash::new();
    for page in 0..=PAGES {
        flash.fill_page(Bank::Bank2, page, |i| {
            (i as u8).wrapping_mul(31).wrapping_add(seed ^ page as u8)
        });
    }
    flash
}

fn snapshot(flash: &SimFlash, page: u16) -> Vec<u8> {
    let mut bytes = vec![0u8; PAGE_SIZE];
    flash.read(page_address(INACTIVE_BANK_BASE, page), &mut bytes);
    bytes
}

fn write(flash: &mut SimFlash, address: u32, data: &[u8]) {
    PageWriter::new(Bank::Bank2)
        .write_without_erase(flash, data, address)
        .expect("write");
}

/// (page, offset, data) for a request that stays inside one page
fn single_page_request() -> impl Strategy<Value = (u16, usize, Vec<u8>)> {
    (0..PAGES, 0..PAGE_SIZE).prop_flat_map(|(page, offset)| {
        let data = prop::collection::vec(any::<u8>(), 1..=PAGE_SIZE - offset);
        (Just(page), Just(offset), data)
    })
}

/// (page, offset, data) for a request that crosses into the next page
fn two_page_request() -> impl Strategy<Value = (u16, usize, Vec<u8>)> {
    (0..PAGES, 1..PAGE_SIZE).prop_flat_map(|(page, offset)| {
        let data = prop::collection::vec(any::<u8>(), PAGE_SIZE - offset + 1..=PAGE_SIZE);
        (Just(page), Just(offset), data)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_single_page_preserves_outside_bytes(
        seed in any::<u8>(),
        (page, offset, data) in single_page_request(),
    ) {
        let mut flash = seeded_flash(seed);
        let before = snapshot(&flash, page);
        let address = page_address(INACTIVE_BANK_BASE, page) + offset as u32;

        write(&mut flash, address, &data);

        let after = snapshot(&flash, page);
        let end = offset + data.len();
        prop_assert_eq!(&after[..offset], &before[..offset]);
        prop_assert_eq!(&after[offset..end], &data[..]);
        prop_assert_eq!(&after[end..], &before[end..]);
        prop_assert_eq!(snapshot(&flash, page + 1), snapshot(&seeded_flash(seed), page + 1));
    }

    #[test]
    fn prop_two_pages_split_correctly(
        seed in any::<u8>(),
        (page, offset, data) in two_page_request(),
    ) {
        let mut flash = seeded_flash(seed);
        let first_before = snapshot(&flash, page);
        let second_before = snapshot(&flash, page + 1);
        let address = page_address(INACTIVE_BANK_BASE, page) + offset as u32;

        write(&mut flash, address, &data);

        let head = PAGE_SIZE - offset;
        let tail = data.len() - head;
        let first = snapshot(&flash, page);
        let second = snapshot(&flash, page + 1);
        prop_assert_eq!(&first[..offset], &first_before[..offset]);
        prop_assert_eq!(&first[offset..], &data[..head]);
        prop_assert_eq!(&second[..tail], &data[head..]);
        prop_assert_eq!(&second[tail..], &second_before[tail..]);
    }

    #[test]
    fn prop_write_is_idempotent(
        seed in any::<u8>(),
        (page, offset, data) in single_page_request(),
    ) {
        let address = page_address(INACTIVE_BANK_BASE, page) + offset as u32;

        let mut once = seeded_flash(seed);
        write(&mut once, address, &data);

        let mut twice = seeded_flash(seed);
        write(&mut twice, address, &data);
        write(&mut twice, address, &data);

        prop_assert_eq!(snapshot(&once, page), snapshot(&twice, page));
        prop_assert_eq!(snapshot(&once, page + 1), snapshot(&twice, page + 1));
    }

    #[test]
    fn prop_round_trip(
        seed in any::<u8>(),
        (page, offset, data) in prop_oneof![single_page_request(), two_page_request()],
    ) {
        let mut flash = seeded_flash(seed);
        let address = page_address(INACTIVE_BANK_BASE, page) + offset as u32;

        write(&mut flash, address, &data);

        let mut back = vec![0u8; data.len()];
        flash.read(address, &mut back);
        prop_assert_eq!(back, data);
    }
}

#[test]
fn test_last_byte_of_page_splits_one_byte_each() {
    let mut flash = seeded_flash(7);
    let page1 = snapshot(&flash, 1);
    let page2 = snapshot(&flash, 2);

    let report = PageWriter::new(Bank::Bank2)
        .write_without_erase(&mut flash, &[0xAA, 0xBB], 0x0808_0FFF)
        .unwrap();

    assert_eq!(report.pages, 2);
    let after1 = snapshot(&flash, 1);
    let after2 = snapshot(&flash, 2);
    assert_eq!(&after1[..PAGE_SIZE - 1], &page1[..PAGE_SIZE - 1]);
    assert_eq!(after1[PAGE_SIZE - 1], 0xAA);
    assert_eq!(after2[0], 0xBB);
    assert_eq!(&after2[1..], &page2[1..]);
}

#[test]
fn test_ten_bytes_at_start_of_page_one() {
    let mut flash = seeded_flash(1);
    let before = snapshot(&flash, 1);
    let data = *b"0123456789";

    PageWriter::new(Bank::Bank2)
        .write_without_erase(&mut flash, &data, 0x0808_0800)
        .unwrap();

    let after = snapshot(&flash, 1);
    assert_eq!(flash.erase_count(Bank::Bank2, 1), 1);
    assert_eq!(&after[..10], &data);
    assert_eq!(&after[10..], &before[10..]);
}

#[test]
fn test_four_bytes_across_pages_one_and_two() {
    let mut flash = seeded_flash(2);
    let before1 = snapshot(&flash, 1);
    let before2 = snapshot(&flash, 2);

    PageWriter::new(Bank::Bank2)
        .write_without_erase(&mut flash, &[1, 2, 3, 4], 0x0808_0FFE)
        .unwrap();

    let after1 = snapshot(&flash, 1);
    let after2 = snapshot(&flash, 2);
    assert_eq!(&after1[..2046], &before1[..2046]);
    assert_eq!(&after1[2046..], &[1, 2]);
    assert_eq!(&after2[..2], &[3, 4]);
    assert_eq!(&after2[2..], &before2[2..]);
    assert_eq!(flash.erase_count(Bank::Bank2, 2), 1);
}
