//! 난수 토큰과 컨테이너 이름 생성
//!
//! 실제 데몬은 64자 hex ID와 `형용사_과학자명` 형태의 컨테이너 이름을
//! 만들어냅니다. 여기서 벗어나는 형식은 정교한 스캐너에게 탐지 신호가
//! 되므로 같은 규칙을 따릅니다.

use rand::Rng;

/// docker가 쓰는 형용사 목록 (발췌)
const ADJECTIVES: &[&str] = &[
    "admiring", "adoring", "affectionate", "agitated", "amazing", "angry", "awesome",
    "beautiful", "blissful", "bold", "brave", "busy", "charming", "clever", "cool",
    "compassionate", "competent", "confident", "cranky", "crazy", "dazzling", "determined",
    "dreamy", "eager", "ecstatic", "elastic", "elated", "elegant", "eloquent", "epic",
    "exciting", "fervent", "festive", "flamboyant", "focused", "friendly", "frosty",
    "funny", "gallant", "gifted", "goofy", "gracious", "great", "happy", "hardcore",
    "heuristic", "hopeful", "hungry", "infallible", "inspiring", "intelligent", "jolly",
    "jovial", "keen", "kind", "laughing", "loving", "lucid", "magical", "modest",
    "musing", "naughty", "nervous", "nice", "nifty", "nostalgic", "objective",
    "optimistic", "peaceful", "pedantic", "pensive", "practical", "priceless", "quirky",
    "quizzical", "recursing", "relaxed", "reverent", "romantic", "serene", "sharp",
    "silly", "sleepy", "stoic", "strange", "stupefied", "suspicious", "sweet", "tender",
    "thirsty", "trusting", "unruffled", "upbeat", "vibrant", "vigilant", "vigorous",
    "wizardly", "wonderful", "xenodochial", "youthful", "zealous", "zen",
];

/// docker가 쓰는 과학자/해커 성씨 목록 (발췌)
const SURNAMES: &[&str] = &[
    "albattani", "allen", "almeida", "agnesi", "archimedes", "ardinghelli", "aryabhata",
    "austin", "babbage", "banach", "banzai", "bardeen", "bartik", "bassi", "beaver",
    "bell", "benz", "bhabha", "bhaskara", "blackburn", "blackwell", "bohr", "booth",
    "borg", "bose", "bouman", "boyd", "brahmagupta", "brattain", "brown", "buck",
    "burnell", "cannon", "carson", "cartwright", "carver", "cerf", "chandrasekhar",
    "chatelet", "chatterjee", "chebyshev", "cohen", "clarke", "colden", "cori", "cray",
    "curie", "darwin", "davinci", "dhawan", "diffie", "dijkstra", "dirac", "driscoll",
    "dubinsky", "easley", "edison", "einstein", "elbakyan", "elgamal", "elion", "ellis",
    "engelbart", "euclid", "euler", "faraday", "feistel", "fermat", "fermi", "feynman",
    "franklin", "gagarin", "galileo", "galois", "ganguly", "gates", "gauss", "germain",
    "goldberg", "goldstine", "goldwasser", "goodall", "gould", "greider", "grothendieck",
    "hamilton", "haslett", "hawking", "hellman", "heisenberg", "hermann", "herschel",
    "hertz", "hodgkin", "hofstadter", "hoover", "hopper", "hugle", "hypatia", "jackson",
    "jang", "jemison", "jennings", "jepsen", "johnson", "joliot", "jones", "kalam",
    "kapitsa", "kare", "keldysh", "keller", "kepler", "khayyam", "khorana", "kilby",
    "kirch", "knuth", "kowalevski", "lalande", "lamarr", "lamport", "leakey", "leavitt",
    "lederberg", "lehmann", "lewin", "lichterman", "liskov", "lovelace", "lumiere",
    "mahavira", "margulis", "matsumoto", "maxwell", "mayer", "mccarthy", "mcclintock",
    "mclaren", "mclean", "mcnulty", "mendel", "mendeleev", "meitner", "meninsky",
    "merkle", "mestorf", "mirzakhani", "montalcini", "moore", "morse", "murdock",
    "moser", "napier", "nash", "neumann", "newton", "nightingale", "nobel", "noether",
    "northcutt", "noyce", "panini", "pare", "pascal", "pasteur", "payne", "perlman",
    "pike", "poincare", "poitras", "ptolemy", "raman", "ramanujan", "ride", "ritchie",
    "rhodes", "robinson", "roentgen", "rosalind", "rubin", "saha", "sammet",
    "sanderson", "satoshi", "shamir", "shannon", "shaw", "shirley", "shockley",
    "sinoussi", "snyder", "solomon", "spence", "stonebraker", "sutherland", "swanson",
    "swartz", "swirles", "taussig", "tereshkova", "tesla", "tharp", "thompson",
    "torvalds", "tu", "turing", "varahamihira", "vaughan", "visvesvaraya", "volhard",
    "villani", "wescoff", "wilbur", "wiles", "williams", "williamson", "wilson",
    "wing", "wozniak", "wright", "wu", "yalow", "yonath", "zhukovsky",
];

/// `n` 바이트 난수를 lowercase hex 문자열로 반환합니다.
///
/// `token_hex(32)`는 Docker ID와 동일한 64자 hex를 만듭니다.
pub fn token_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

/// `/형용사_성씨` 형태의 컨테이너 이름을 생성합니다.
pub fn random_container_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let surname = SURNAMES[rng.gen_range(0..SURNAMES.len())];
    format!("/{adjective}_{surname}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hex_has_expected_length_and_alphabet() {
        let token = token_hex(32);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token, token.to_lowercase());
    }

    #[test]
    fn token_hex_is_not_constant() {
        assert_ne!(token_hex(32), token_hex(32));
    }

    #[test]
    fn token_hex_short_lengths() {
        assert_eq!(token_hex(6).len(), 12);
        assert_eq!(token_hex(1).len(), 2);
    }

    #[test]
    fn container_name_has_docker_shape() {
        let name = random_container_name();
        assert!(name.starts_with('/'));
        let rest = &name[1..];
        let parts: Vec<&str> = rest.split('_').collect();
        assert_eq!(parts.len(), 2);
        assert!(ADJECTIVES.contains(&parts[0]));
        assert!(SURNAMES.contains(&parts[1]));
    }

    #[test]
    fn word_lists_are_nonempty() {
        assert!(ADJECTIVES.len() > 50);
        assert!(SURNAMES.len() > 100);
    }
}
