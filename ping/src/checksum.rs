//! Internet Checksum Implementation (RFC 1071)

/// Calculate Internet checksum for IP/ICMP packets
///
/// Sums the buffer as big-endian 16-bit words. An odd trailing byte is the
/// high half of a zero-padded word. Carries are folded back before taking
/// the one's complement.
pub fn calculate_checksum(data: &[u8]) -> u16 {
    // 64-bit accumulator: no overflow below 2^48 words
    let mut sum: u64 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_be_bytes([word[0], word[1]]) as u64;
    }

    if let [last] = words.remainder() {
        sum += (*last as u64) << 8;
    }

    // Fold to 16 bits with end-around carry
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Verify checksum of a packet
///
/// Returns true if the checksum computed over data that includes a filled
/// checksum field is zero.
pub fn verify_checksum(data: &[u8]) -> bool {
    calculate_checksum(data) == 0
}

/// Compute the checksum with the field at `offset` zeroed and store it there
///
/// `data` must hold at least `offset + 2` bytes.
pub fn fill_checksum(data: &mut [u8], offset: usize) {
    data[offset..offset + 2].copy_from_slice(&[0, 0]);
    let checksum = calculate_checksum(data);
    data[offset..offset + 2].copy_from_slice(&checksum.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_zeros() {
        // All zeros should give checksum of 0xFFFF
        let data = [0u8; 20];
        assert_eq!(calculate_checksum(&data), 0xFFFF);
    }

    #[test]
    fn test_checksum_ones() {
        // All 0xFF should fold to 0
        let data = [0xFFu8; 20];
        assert_eq!(calculate_checksum(&data), 0);
    }

    #[test]
    fn test_checksum_rfc1071_example() {
        // RFC 1071 section 3 sample: sum is 0xddf2, complement 0x220d
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(calculate_checksum(&data), 0x220d);
    }

    #[test]
    fn test_verify_valid() {
        let mut data = [0x45, 0x00, 0x00, 0x3c, 0x1c, 0x46, 0x40, 0x00,
                        0x40, 0x06, 0x00, 0x00, 0xac, 0x10, 0x0a, 0x63,
                        0xac, 0x10, 0x0a, 0x0c];

        fill_checksum(&mut data, 10);

        assert_eq!(&data[10..12], &[0xb1, 0xe6]);
        assert!(verify_checksum(&data));
    }

    #[test]
    fn test_self_inverting_for_many_buffers() {
        for len in [4usize, 8, 9, 31, 64, 65, 1500] {
            let mut data: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            fill_checksum(&mut data, 2);
            assert!(verify_checksum(&data), "length {}", len);
        }
    }

    #[test]
    fn test_odd_length_pads_low_byte() {
        // [0xAB] is the word 0xAB00
        assert_eq!(calculate_checksum(&[0xAB]), !0xAB00u16);
        assert_eq!(calculate_checksum(&[0x12, 0x34, 0xAB]), !(0x1234u16 + 0xAB00));
    }

    #[test]
    fn test_alignment_independent() {
        let words = [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0xfe, 0xdc];
        let mut shifted = [0u8; 9];
        shifted[1..].copy_from_slice(&words);

        assert_eq!(calculate_checksum(&words), calculate_checksum(&shifted[1..]));
    }

    #[test]
    fn test_large_buffer() {
        let ones = vec![0xFFu8; 140_000];
        assert_eq!(calculate_checksum(&ones), 0);

        let mut data: Vec<u8> = (0..200_001usize).map(|i| (i * 131 + 7) as u8).collect();
        fill_checksum(&mut data, 0);
        assert!(verify_checksum(&data));
    }

    #[test]
    fn test_carry_fold() {
        // 0xFFFF + 0x0001 = 0x10000, folds to 0x0001
        assert_eq!(calculate_checksum(&[0xFF, 0xFF, 0x00, 0x01]), !0x0001u16);
    }
}
