/// Calculate the key tag for a DNSKEY record (RFC 4034 Appendix B)
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // RSAMD5 uses the most significant 16 bits of the least significant
    // 24 bits of the modulus (Appendix B.1)
    if algorithm == 1 {
        let len = public_key.len();
        if len < 3 {
            return 0;
        }
        return u16::from_be_bytes([public_key[len - 3], public_key[len - 2]]);
    }

    // Sum the RDATA as 16-bit big-endian words: flags, then protocol and
    // algorithm, then the key itself with an odd trailing byte as the high half
    let mut accumulator: u32 = u32::from(flags);
    accumulator += u32::from(u16::from_be_bytes([protocol, algorithm]));

    let mut words = public_key.chunks_exact(2);
    for word in &mut words {
        accumulator += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        accumulator += u32::from(*last) << 8;
    }

    // Fold the carries into the low 16 bits
    accumulator += (accumulator >> 16) & 0xFFFF;
    (accumulator & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_key_tag_calculation() {
        let flags = 0x0101; // KSK
        let protocol = 3;
        let algorithm = 5; // RSASHA1
        let public_key = hex::decode(
            "030101a80020a95566ba42e886bb804cda84e47ef56dbd7aec612615552cec906d3e9b72dc4f90d3fc09b8e9d0ff2ae8ee5ed8cd61d7622c39ee2d76a2153bc0ac8b9e254125c46e0a224507fb358d7f6b5d7a42f75e60b9748e7c0747e2447f4bd7d10ca24bb1498de34a504406bbeb3b041fe48d0ad2b1de5adadb87d0c8824e7cc4dc3e5b7f0b3e8ac72c3d3d8aa7251abcaad82ad5ececed8cd83825d19ffd95e93bca729fdd88901b20fc598fb6a0779ddfa95e3e42ca9d0a7739d3c4ad3a7a5a30b3c60a73a6f09fdb812746e0d69edfba06754465f2e1dd5e3802e6d05bd6148e38fd8ca1632b71f6559fe9b6e18d73c5a750e3e2f2f205972e7b28ae04ddae5e27915a08d217db5ce090c119d23f79fb"
        ).unwrap();

        assert_eq!(calculate_key_tag(flags, protocol, algorithm, &public_key), 55495);
    }

    #[test]
    fn test_key_tag_rfc4034_example() {
        // dskey.example.com. from RFC 4034 section 5.4
        let public_key = STANDARD
            .decode(
                "AQOeiiR0GOMYkDshWoSKz9XzfwJr1AYtsmx3TGkJaNXVbfi/2pHm822aJ5iI9BMzNXxeYCmZ\
                 DRD99WYwYqUSdjMmmAphXdvxegXd/M5+X7OrzKBaMbCVdFLUUh6DhweJBjEVv5f2wwjM9Xzc\
                 nOf+EPbtG9DMBmADjFDc2w/rljwvFw==",
            )
            .unwrap();

        assert_eq!(calculate_key_tag(256, 3, 5, &public_key), 60485);
    }

    #[test]
    fn test_key_tag_rfc6605_example() {
        // example.net. ECDSAP256SHA256 KSK from RFC 6605 section 6.1
        let public_key = STANDARD
            .decode(
                "GojIhhXUN/u4v54ZQqGSnyhWJwaubCvTmeexv7bR6edbkrSqQpF64cYbcB7wNcP+e+MAnLr+\
                 Wi9xMWyQLc8NAA==",
            )
            .unwrap();

        assert_eq!(calculate_key_tag(257, 3, 13, &public_key), 55648);
    }

    #[test]
    fn test_key_tag_odd_length() {
        // flags 0x0100, proto/alg 0x0308, key words 0x0102 and 0x0300 (padded)
        let key_tag = calculate_key_tag(256, 3, 8, &[0x01, 0x02, 0x03]);
        assert_eq!(key_tag, 0x0100 + 0x0308 + 0x0102 + 0x0300);
    }

    #[test]
    fn test_key_tag_carry_fold() {
        // 0xFFFF + 0x0308 + 0xFFFF overflows twice into the high half
        let key_tag = calculate_key_tag(0xFFFF, 3, 8, &[0xFF, 0xFF]);
        let sum: u32 = 0xFFFF + 0x0308 + 0xFFFF;
        assert_eq!(key_tag, ((sum + (sum >> 16)) & 0xFFFF) as u16);
    }

    #[test]
    fn test_key_tag_rsamd5() {
        let public_key = vec![0x12, 0x34, 0x56, 0x78];
        assert_eq!(calculate_key_tag(0x0101, 3, 1, &public_key), 0x3456);
        assert_eq!(calculate_key_tag(0x0101, 3, 1, &[0x12, 0x34]), 0);
    }
}
