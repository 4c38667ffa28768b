//! Built-in prompt set used when a batch run is started without an input file.

/// Ten long-form prompts that exercise sustained generation.
pub const SAMPLE_PROMPTS: [&str; 10] = [
    "Analyze how artificial intelligence could change healthcare over the next ten years. Cover diagnostics, patient care, and medical research, and weigh the benefits against the ethical and practical risks.",
    "Write a detailed essay on renewable energy: its history, where solar, wind, hydroelectric, and newer technologies stand today, and how their costs and environmental impact compare.",
    "Explain how large language models work, from architecture and training to their capabilities and limits. Use concrete examples and discuss where the field is heading.",
    "Compare capitalism, socialism, and mixed economies using historical examples of each. Discuss their successes and failures and how they might adapt to global challenges.",
    "Write a guide to building a scalable web application from scratch, covering architecture, choice of technology stack, development practices, security, deployment, and maintenance.",
    "Examine consciousness from the viewpoints of neuroscience, philosophy of mind, artificial intelligence, and several cultural and religious traditions, including the hard problem and the main theories that address it.",
    "Give a thorough overview of climate science: the evidence, causes, projected impacts, mitigation and adaptation strategies, and the difficulties of international cooperation.",
    "Trace how storytelling evolved from oral traditions to digital media. Analyze which narrative structures and themes changed and which stayed constant across cultures.",
    "Analyze global food security, including agricultural systems, distribution, economics, and climate impacts, and evaluate technological and policy solutions for sustainable food systems.",
    "Explain how quantum computing works, its current state, its technical obstacles, and how it could transform cryptography, materials science, drug discovery, and artificial intelligence.",
];
